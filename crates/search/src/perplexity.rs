use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};
use wayfare_core::{QueryError, SYSTEM_PROMPT};

use crate::{EstimateQueryClient, SearchConfig};

/// Client for an OpenAI-compatible chat-completions search endpoint.
#[derive(Debug, Clone)]
pub struct PerplexityClient {
    http: Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl PerplexityClient {
    pub fn new(api_key: &str, config: &SearchConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(6))
            .timeout(config.timeout)
            .build()
            .context("failed to build search HTTP client")?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
        })
    }

    async fn send_once(&self, prompt: &str) -> Result<String, QueryError> {
        let payload = serde_json::json!({
            "model": self.model,
            "temperature": 0.2,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt }
            ]
        });

        let response = self
            .http
            .post(self.endpoint.as_str())
            .bearer_auth(self.api_key.as_str())
            .json(&payload)
            .send()
            .await
            .map_err(|error| QueryError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|error| QueryError::Transport(format!("invalid response body: {error}")))?;

        extract_completion_text(&body)
            .filter(|text| !text.trim().is_empty())
            .ok_or(QueryError::EmptyResponse)
    }
}

impl EstimateQueryClient for PerplexityClient {
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn query(&self, context: &str, prompt: &str) -> Result<String, QueryError> {
        let mut attempt = 0_u32;
        loop {
            match self.send_once(prompt).await {
                Ok(text) => return Ok(text),
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.retry_backoff * 2_u32.pow(attempt - 1);
                    debug!(
                        context,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying search query"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Pulls the assistant text out of a chat-completions or responses payload.
pub fn extract_completion_text(payload: &Value) -> Option<String> {
    if let Some(text) = payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
    {
        return Some(text.to_string());
    }

    if let Some(text) = payload.get("output_text").and_then(Value::as_str) {
        return Some(text.to_string());
    }

    let chunks = payload
        .get("output")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|content| content.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|content| content.get("text").and_then(Value::as_str))
        .map(ToString::to_string)
        .collect::<Vec<_>>();

    (!chunks.is_empty()).then(|| chunks.join("\n\n"))
}
