use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Process-local counters, mirrored to the `metrics` facade so an installed
/// exporter sees the same numbers.
#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    category_failures_total: AtomicU64,
    llm_queries_total: AtomicU64,
    rating_cache_hits_total: AtomicU64,
    rating_cache_misses_total: AtomicU64,
    budget_plans_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub category_failures_total: u64,
    pub llm_queries_total: u64,
    pub rating_cache_hits_total: u64,
    pub rating_cache_misses_total: u64,
    pub budget_plans_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self, request_type: &'static str) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        counter!("wayfare_requests_total", "request_type" => request_type).increment(1);
    }

    pub fn inc_category_failure(&self, category: &'static str) {
        self.category_failures_total.fetch_add(1, Ordering::Relaxed);
        counter!("wayfare_category_failures_total", "category" => category).increment(1);
    }

    pub fn inc_llm_query(&self) {
        self.llm_queries_total.fetch_add(1, Ordering::Relaxed);
        counter!("wayfare_llm_queries_total").increment(1);
    }

    pub fn inc_rating_cache_hit(&self) {
        self.rating_cache_hits_total.fetch_add(1, Ordering::Relaxed);
        counter!("wayfare_rating_cache_hits_total").increment(1);
    }

    pub fn inc_rating_cache_miss(&self) {
        self.rating_cache_misses_total
            .fetch_add(1, Ordering::Relaxed);
        counter!("wayfare_rating_cache_misses_total").increment(1);
    }

    pub fn inc_budget_plan(&self) {
        self.budget_plans_total.fetch_add(1, Ordering::Relaxed);
        counter!("wayfare_budget_plans_total").increment(1);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        histogram!("wayfare_request_latency_seconds").record(duration.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            category_failures_total: self.category_failures_total.load(Ordering::Relaxed),
            llm_queries_total: self.llm_queries_total.load(Ordering::Relaxed),
            rating_cache_hits_total: self.rating_cache_hits_total.load(Ordering::Relaxed),
            rating_cache_misses_total: self.rating_cache_misses_total.load(Ordering::Relaxed),
            budget_plans_total: self.budget_plans_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,wayfare_api=info,wayfare_agents=info,wayfare_search=info,wayfare_core=warn",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_averages_latency_over_requests() {
        let metrics = AppMetrics::default();
        metrics.inc_request("flights");
        metrics.inc_request("full");
        metrics.observe_latency(Duration::from_millis(30));
        metrics.observe_latency(Duration::from_millis(10));
        metrics.inc_rating_cache_hit();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 2);
        assert_eq!(snapshot.rating_cache_hits_total, 1);
        assert_eq!(snapshot.avg_latency_millis, 20.0);
    }

    #[test]
    fn empty_snapshot_has_zero_latency() {
        assert_eq!(AppMetrics::default().snapshot().avg_latency_millis, 0.0);
    }
}
