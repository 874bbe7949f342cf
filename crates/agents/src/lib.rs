mod planner;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use wayfare_core::{
    build_prompt, parse_category_response, CategoryEstimate, EstimateError, ExpenseCategory,
    RequestType, ResponseEnvelope, TravelEstimate, TripParameters,
};
use wayfare_observability::AppMetrics;
use wayfare_search::EstimateQueryClient;
use wayfare_storage::{EstimateRecord, EstimateRepository};

pub use planner::{BudgetPlanner, RatingCache, DEFAULT_RATING_CACHE_CAPACITY};

/// Turns trip parameters into normalized cost estimates by querying the
/// search backend once per expense category.
pub struct EstimateAgent<Q, S>
where
    Q: EstimateQueryClient,
    S: EstimateRepository,
{
    client: Arc<Q>,
    store: Arc<S>,
    metrics: Arc<AppMetrics>,
}

impl<Q, S> Clone for EstimateAgent<Q, S>
where
    Q: EstimateQueryClient,
    S: EstimateRepository,
{
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            store: Arc::clone(&self.store),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<Q, S> EstimateAgent<Q, S>
where
    Q: EstimateQueryClient,
    S: EstimateRepository,
{
    pub fn new(client: Arc<Q>, store: Arc<S>, metrics: Arc<AppMetrics>) -> Self {
        Self {
            client,
            store,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[instrument(skip(self, params))]
    pub async fn process_category(
        &self,
        category: ExpenseCategory,
        params: &TripParameters,
    ) -> Result<CategoryEstimate, EstimateError> {
        let prompt = build_prompt(category, params);
        self.metrics.inc_llm_query();

        let outcome = match self.client.query(category.as_key(), &prompt).await {
            Ok(raw) => parse_category_response(category, &raw),
            Err(source) => Err(EstimateError::Query { category, source }),
        };

        if let Err(error) = &outcome {
            self.metrics.inc_category_failure(category.as_key());
            warn!(category = %category, error = %error, "category estimate failed");
        }

        outcome
    }

    #[instrument(skip(self, params), fields(destination = %params.country))]
    pub async fn handle_travel_request(
        &self,
        request_type: &str,
        params: TripParameters,
    ) -> Result<ResponseEnvelope<TravelEstimate>, EstimateError> {
        let started = Instant::now();
        let request_type = RequestType::parse(request_type)?;
        let params = params.validated()?;
        self.metrics.inc_request(request_type.as_str());

        let estimate = match request_type {
            RequestType::Flights => TravelEstimate {
                flights: Some(
                    self.process_category(ExpenseCategory::Flight, &params)
                        .await?,
                ),
                hotels: None,
            },
            RequestType::Hotels => TravelEstimate {
                flights: None,
                hotels: Some(
                    self.process_category(ExpenseCategory::Accommodation, &params)
                        .await?,
                ),
            },
            RequestType::Full => {
                let (flights, hotels) = futures::try_join!(
                    self.process_category(ExpenseCategory::Flight, &params),
                    self.process_category(ExpenseCategory::Accommodation, &params),
                )?;
                TravelEstimate {
                    flights: Some(flights),
                    hotels: Some(hotels),
                }
            }
        };

        let envelope = ResponseEnvelope::ok(estimate);
        self.persist(request_type, &params, &envelope).await;

        self.metrics.observe_latency(started.elapsed());
        info!(
            request_type = request_type.as_str(),
            travelers = params.travelers,
            currency = %params.currency,
            "travel estimate handled"
        );

        Ok(envelope)
    }

    pub async fn recent_estimates(&self, limit: usize) -> Result<Vec<EstimateRecord>> {
        self.store.recent_estimates(limit).await
    }

    pub async fn purge_history_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.store.purge_before(cutoff).await
    }

    async fn persist(
        &self,
        request_type: RequestType,
        params: &TripParameters,
        envelope: &ResponseEnvelope<TravelEstimate>,
    ) {
        let saved = match EstimateRecord::travel(request_type, params, envelope) {
            Ok(record) => self.store.record_estimate(&record).await,
            Err(error) => Err(error),
        };

        if let Err(error) = saved {
            warn!(error = %error, "failed to persist travel estimate");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfare_core::{QueryError, TierName};
    use wayfare_search::ScriptedClient;
    use wayfare_storage::{MemoryStore, RecordKind};

    const FLIGHT_REPLY: &str = "```json\n{\"flight\":{\"budget\":{\"Minimum\":200,\"Maximum\":400,\"Average\":300,\"Confidence\":0.8,\"Source\":\"Skyscanner\",\"Examples\":[\"Delta $300 https://delta.com\"]}}}\n```";
    const HOTEL_REPLY: &str = r#"Here you go: {"accommodation": {"budget": {"min": 40, "max": 80, "average": 60}, "medium": {"min": 90, "max": 150, "average": 120}}}"#;

    fn agent(client: ScriptedClient) -> EstimateAgent<ScriptedClient, MemoryStore> {
        EstimateAgent::new(
            Arc::new(client),
            Arc::new(MemoryStore::new()),
            AppMetrics::shared(),
        )
    }

    fn params() -> TripParameters {
        serde_json::from_value(serde_json::json!({
            "country": "Portugal",
            "travelers": 2,
            "currency": "eur",
            "departureLocation": {
                "name": "Boston",
                "isRoundTrip": true,
                "outboundDate": "2026-05-01",
                "inboundDate": "2026-05-10"
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn flight_reply_is_normalized() {
        let agent = agent(ScriptedClient::new().with_reply("flight", FLIGHT_REPLY));

        let estimate = agent
            .process_category(ExpenseCategory::Flight, &params())
            .await
            .unwrap();

        let budget = estimate.tier(TierName::Budget);
        assert_eq!(budget.average, 300.0);
        assert_eq!(budget.source, "Skyscanner");
        assert!(budget.references[0].as_flight().is_some());
    }

    #[tokio::test]
    async fn unparseable_reply_fails_the_category() {
        let agent = agent(ScriptedClient::new().with_reply("accommodation", "not json at all"));

        let error = agent
            .process_category(ExpenseCategory::Accommodation, &params())
            .await
            .unwrap_err();

        assert!(matches!(error, EstimateError::UnparseableResponse { .. }));
        assert_eq!(agent.metrics().snapshot().category_failures_total, 1);
    }

    #[tokio::test]
    async fn query_failure_names_the_category() {
        let agent = agent(
            ScriptedClient::new().with_failure("flight", QueryError::Transport("reset".into())),
        );

        let error = agent
            .process_category(ExpenseCategory::Flight, &params())
            .await
            .unwrap_err();

        assert_eq!(error.category(), Some(ExpenseCategory::Flight));
        assert!(matches!(error, EstimateError::Query { .. }));
    }

    #[tokio::test]
    async fn full_request_returns_both_categories_and_persists() {
        let agent = agent(
            ScriptedClient::new()
                .with_reply("flight", FLIGHT_REPLY)
                .with_reply("accommodation", HOTEL_REPLY),
        );

        let envelope = agent
            .handle_travel_request("FULL", params())
            .await
            .unwrap();

        assert!(envelope.success);
        let data = envelope.data.unwrap();
        assert_eq!(data.flights.unwrap().budget.min, 200.0);
        assert_eq!(data.hotels.unwrap().medium.average, 120.0);

        let history = agent.recent_estimates(10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, RecordKind::TravelEstimate);
        assert_eq!(history[0].request["currency"], "EUR");
    }

    #[tokio::test]
    async fn full_request_fails_when_either_category_fails() {
        let agent = agent(
            ScriptedClient::new()
                .with_reply("flight", FLIGHT_REPLY)
                .with_reply("accommodation", "not json at all"),
        );

        let error = agent
            .handle_travel_request("full", params())
            .await
            .unwrap_err();

        assert_eq!(error.category(), Some(ExpenseCategory::Accommodation));
        assert!(agent.recent_estimates(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn hotels_request_only_queries_accommodation() {
        let client = ScriptedClient::new().with_reply("accommodation", HOTEL_REPLY);
        let agent = agent(client.clone());

        let envelope = agent
            .handle_travel_request("hotels", params())
            .await
            .unwrap();

        let data = envelope.data.unwrap();
        assert!(data.flights.is_none());
        assert_eq!(data.hotels.unwrap().premium.confidence, 0.7);
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn invalid_request_type_is_rejected_before_querying() {
        let client = ScriptedClient::new().with_fallback("{}");
        let agent = agent(client.clone());

        let error = agent
            .handle_travel_request("cruises", params())
            .await
            .unwrap_err();

        assert!(matches!(error, EstimateError::InvalidRequestType(_)));
        assert!(error.is_client_error());
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn invalid_parameters_are_rejected() {
        let agent = agent(ScriptedClient::new().with_fallback("{}"));
        let mut params = params();
        params.travelers = 0;

        let error = agent
            .handle_travel_request("flights", params)
            .await
            .unwrap_err();

        assert!(matches!(error, EstimateError::InvalidParameters(_)));
    }
}
