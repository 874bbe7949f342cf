use thiserror::Error;

use crate::models::ExpenseCategory;
use crate::normalize::preview;

/// Failure of the LLM search collaborator.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    #[error("estimate search backend is not configured")]
    NotConfigured,

    #[error("estimate search transport failed: {0}")]
    Transport(String),

    #[error("estimate search returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("estimate search returned no content")]
    EmptyResponse,
}

impl QueryError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::NotConfigured | Self::EmptyResponse => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum EstimateError {
    #[error("failed to parse {category} estimates from search response: {}", preview(.raw, 160))]
    UnparseableResponse {
        category: ExpenseCategory,
        raw: String,
    },

    #[error("{category} estimate query failed: {source}")]
    Query {
        category: ExpenseCategory,
        #[source]
        source: QueryError,
    },

    #[error("invalid request type '{0}', expected one of flights, hotels, full")]
    InvalidRequestType(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

impl EstimateError {
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::InvalidParameters(message.into())
    }

    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequestType(_) | Self::InvalidParameters(_)
        )
    }

    pub fn category(&self) -> Option<ExpenseCategory> {
        match self {
            Self::UnparseableResponse { category, .. } | Self::Query { category, .. } => {
                Some(*category)
            }
            Self::InvalidRequestType(_) | Self::InvalidParameters(_) => None,
        }
    }
}
