pub mod allocation;
pub mod error;
pub mod extract;
pub mod models;
pub mod normalize;
pub mod prompt;
pub mod tier;

pub use allocation::{
    compute_budget_plan, recommend_businesses, validate_budget_fit, DEFAULT_MAX_RESULTS,
};
pub use error::{EstimateError, QueryError};
pub use extract::extract_json;
pub use models::*;
pub use prompt::{build_prompt, build_rating_prompt, SYSTEM_PROMPT};
pub use tier::{normalize_tier, parse_category_response};
