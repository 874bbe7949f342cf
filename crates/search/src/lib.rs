mod perplexity;
pub mod rating;
mod scripted;

use std::env;
use std::time::Duration;

use anyhow::Result;
use wayfare_core::QueryError;

pub use perplexity::{extract_completion_text, PerplexityClient};
pub use rating::{FixedRatings, LlmRatingService, RatingBackend, RatingLookup, RatingService};
pub use scripted::ScriptedClient;

pub const DEFAULT_SEARCH_URL: &str = "https://api.perplexity.ai/chat/completions";
pub const DEFAULT_SEARCH_MODEL: &str = "sonar";

/// Sends a prompt to the LLM search service and returns its raw text reply.
///
/// `context` names what the prompt is for (an expense category, a rating
/// lookup) and is used for logging and for routing scripted replies.
pub trait EstimateQueryClient: Send + Sync {
    async fn query(&self, context: &str, prompt: &str) -> Result<String, QueryError>;
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_SEARCH_URL.to_string(),
            model: DEFAULT_SEARCH_MODEL.to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl SearchConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            api_key: env::var("WAYFARE_SEARCH_API_KEY")
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            endpoint: env::var("WAYFARE_SEARCH_URL").unwrap_or(defaults.endpoint),
            model: env::var("WAYFARE_SEARCH_MODEL").unwrap_or(defaults.model),
            timeout: env::var("WAYFARE_SEARCH_TIMEOUT_SECONDS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: env::var("WAYFARE_SEARCH_MAX_RETRIES")
                .ok()
                .and_then(|value| value.parse::<u32>().ok())
                .map(|value| value.min(5))
                .unwrap_or(defaults.max_retries),
            retry_backoff: defaults.retry_backoff,
        }
    }
}

#[derive(Clone)]
pub enum QueryBackend {
    Perplexity(PerplexityClient),
    Scripted(ScriptedClient),
    Unconfigured,
}

impl QueryBackend {
    /// Live client when an API key is configured, otherwise a backend whose
    /// queries fail with [`QueryError::NotConfigured`].
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        match config.api_key.as_deref() {
            Some(api_key) => Ok(Self::Perplexity(PerplexityClient::new(api_key, config)?)),
            None => Ok(Self::Unconfigured),
        }
    }

    pub fn is_configured(&self) -> bool {
        !matches!(self, Self::Unconfigured)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Perplexity(_) => "perplexity",
            Self::Scripted(_) => "scripted",
            Self::Unconfigured => "unconfigured",
        }
    }
}

impl EstimateQueryClient for QueryBackend {
    async fn query(&self, context: &str, prompt: &str) -> Result<String, QueryError> {
        match self {
            QueryBackend::Perplexity(client) => client.query(context, prompt).await,
            QueryBackend::Scripted(client) => client.query(context, prompt).await,
            QueryBackend::Unconfigured => Err(QueryError::NotConfigured),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_backend_refuses_queries() {
        let backend = QueryBackend::from_config(&SearchConfig::default()).unwrap();
        assert!(!backend.is_configured());

        let error = backend.query("flight", "prompt").await.unwrap_err();
        assert!(matches!(error, QueryError::NotConfigured));
    }

    #[test]
    fn configured_key_selects_live_client() {
        let config = SearchConfig {
            api_key: Some("pplx-test".to_string()),
            ..SearchConfig::default()
        };
        let backend = QueryBackend::from_config(&config).unwrap();
        assert_eq!(backend.name(), "perplexity");
    }
}
