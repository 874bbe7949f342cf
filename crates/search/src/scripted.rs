use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use wayfare_core::QueryError;

use crate::EstimateQueryClient;

/// Replays canned replies keyed by query context. Used for offline runs and
/// tests.
#[derive(Debug, Clone, Default)]
pub struct ScriptedClient {
    replies: Arc<RwLock<HashMap<String, Result<String, QueryError>>>>,
    fallback: Option<String>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, context: &str, reply: impl Into<String>) -> Self {
        self.replies
            .write()
            .insert(context.to_string(), Ok(reply.into()));
        self
    }

    pub fn with_failure(self, context: &str, error: QueryError) -> Self {
        self.replies.write().insert(context.to_string(), Err(error));
        self
    }

    /// Reply used for any context without a scripted entry.
    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    /// `(context, prompt)` pairs in the order they were queried.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }
}

impl EstimateQueryClient for ScriptedClient {
    async fn query(&self, context: &str, prompt: &str) -> Result<String, QueryError> {
        self.calls
            .lock()
            .push((context.to_string(), prompt.to_string()));

        if let Some(reply) = self.replies.read().get(context) {
            return reply.clone();
        }

        self.fallback.clone().ok_or(QueryError::EmptyResponse)
    }
}
