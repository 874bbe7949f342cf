use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use wayfare_core::normalize::{number_field, string_field};
use wayfare_core::{build_rating_prompt, extract_json, BusinessCategory};

use crate::{EstimateQueryClient, QueryBackend};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RatingLookup {
    pub rating: Option<f64>,
    pub source: Option<String>,
}

/// Best-effort rating lookup. Every failure path yields an empty lookup.
pub trait RatingService: Send + Sync {
    async fn fetch_rating(&self, business_name: &str, category: BusinessCategory) -> RatingLookup;
}

/// Asks the LLM search backend for a public review rating.
#[derive(Clone)]
pub struct LlmRatingService {
    backend: QueryBackend,
}

impl LlmRatingService {
    pub fn new(backend: QueryBackend) -> Self {
        Self { backend }
    }
}

impl RatingService for LlmRatingService {
    async fn fetch_rating(&self, business_name: &str, category: BusinessCategory) -> RatingLookup {
        let prompt = build_rating_prompt(business_name, category);
        let context = format!("rating:{category}");

        match self.backend.query(&context, &prompt).await {
            Ok(raw) => parse_rating_reply(&raw),
            Err(error) => {
                warn!(business = business_name, category = %category, error = %error, "rating lookup failed");
                RatingLookup::default()
            }
        }
    }
}

/// Reads `{ "rating": .., "source": .. }` out of a free-form reply.
pub fn parse_rating_reply(raw: &str) -> RatingLookup {
    let candidate = extract_json(raw);
    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(&candidate) else {
        debug!("rating reply was not a JSON object");
        return RatingLookup::default();
    };

    RatingLookup {
        rating: number_field(&object, &["rating", "Rating"]).filter(|rating| *rating <= 5.0),
        source: string_field(&object, &["source", "Source"]),
    }
}

/// Static rating table, matched on category and case-insensitive name.
#[derive(Debug, Clone, Default)]
pub struct FixedRatings {
    ratings: HashMap<(BusinessCategory, String), f64>,
    default_rating: Option<f64>,
}

impl FixedRatings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds from a `category -> name -> rating` table, the shape used by
    /// rating files.
    pub fn from_table(table: BTreeMap<BusinessCategory, BTreeMap<String, f64>>) -> Self {
        table
            .into_iter()
            .flat_map(|(category, names)| {
                names
                    .into_iter()
                    .map(move |(name, rating)| (category, name, rating))
            })
            .fold(Self::new(), |ratings, (category, name, rating)| {
                ratings.with_rating(category, &name, rating)
            })
    }

    pub fn with_rating(mut self, category: BusinessCategory, name: &str, rating: f64) -> Self {
        self.ratings
            .insert((category, name.trim().to_lowercase()), rating);
        self
    }

    /// Rating reported for businesses missing from the table.
    pub fn with_default(mut self, rating: f64) -> Self {
        self.default_rating = Some(rating);
        self
    }
}

impl RatingService for FixedRatings {
    async fn fetch_rating(&self, business_name: &str, category: BusinessCategory) -> RatingLookup {
        let rating = self
            .ratings
            .get(&(category, business_name.trim().to_lowercase()))
            .copied()
            .or(self.default_rating);

        RatingLookup {
            rating,
            source: rating.map(|_| "fixed".to_string()),
        }
    }
}

#[derive(Clone)]
pub enum RatingBackend {
    Llm(LlmRatingService),
    Fixed(FixedRatings),
}

impl RatingBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Llm(_) => "llm",
            Self::Fixed(_) => "fixed",
        }
    }
}

impl RatingService for RatingBackend {
    async fn fetch_rating(&self, business_name: &str, category: BusinessCategory) -> RatingLookup {
        match self {
            RatingBackend::Llm(service) => service.fetch_rating(business_name, category).await,
            RatingBackend::Fixed(service) => service.fetch_rating(business_name, category).await,
        }
    }
}
