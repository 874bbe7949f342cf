use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};
use wayfare_core::{
    compute_budget_plan, recommend_businesses, BudgetPlan, BudgetRequest, Business,
    BusinessCategory, EstimateError, RecommendedBusiness, TierName, DEFAULT_MAX_RESULTS,
};
use wayfare_observability::AppMetrics;
use wayfare_search::RatingService;
use wayfare_storage::{EstimateRecord, EstimateRepository};

pub const DEFAULT_RATING_CACHE_CAPACITY: usize = 1024;

type RatingKey = (BusinessCategory, String);

fn rating_key(category: BusinessCategory, name: &str) -> RatingKey {
    (category, name.trim().to_lowercase())
}

/// Bounded map of known ratings. Only successful lookups are kept, and the
/// oldest entry is evicted first once capacity is reached.
#[derive(Debug)]
pub struct RatingCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Debug, Default)]
struct CacheInner {
    ratings: HashMap<RatingKey, f64>,
    order: VecDeque<RatingKey>,
}

impl RatingCache {
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn get(&self, category: BusinessCategory, name: &str) -> Option<f64> {
        self.inner
            .lock()
            .ratings
            .get(&rating_key(category, name))
            .copied()
    }

    pub fn insert(&self, category: BusinessCategory, name: &str, rating: f64) {
        if self.capacity == 0 {
            return;
        }

        let key = rating_key(category, name);
        let mut inner = self.inner.lock();
        if inner.ratings.insert(key.clone(), rating).is_some() {
            return;
        }

        inner.order.push_back(key);
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.ratings.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RatingCache {
    fn default() -> Self {
        Self::new(DEFAULT_RATING_CACHE_CAPACITY)
    }
}

/// Splits a trip budget across categories and tiers from business ratings.
pub struct BudgetPlanner<R, S>
where
    R: RatingService,
    S: EstimateRepository,
{
    ratings: Arc<R>,
    store: Arc<S>,
    cache: Arc<RatingCache>,
    metrics: Arc<AppMetrics>,
}

impl<R, S> Clone for BudgetPlanner<R, S>
where
    R: RatingService,
    S: EstimateRepository,
{
    fn clone(&self) -> Self {
        Self {
            ratings: Arc::clone(&self.ratings),
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<R, S> BudgetPlanner<R, S>
where
    R: RatingService,
    S: EstimateRepository,
{
    pub fn new(
        ratings: Arc<R>,
        store: Arc<S>,
        cache: RatingCache,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            ratings,
            store,
            cache: Arc::new(cache),
            metrics,
        }
    }

    pub fn cache(&self) -> &RatingCache {
        &self.cache
    }

    #[instrument(skip(self, request), fields(categories = request.businesses.len()))]
    pub async fn calculate_optimal_budget(
        &self,
        request: BudgetRequest,
    ) -> Result<BudgetPlan, EstimateError> {
        let started = Instant::now();
        request.validate()?;

        let names = request
            .businesses
            .iter()
            .flat_map(|(category, tiers)| {
                tiers
                    .values()
                    .flatten()
                    .map(move |business| (*category, business.name.as_str()))
            })
            .collect::<Vec<_>>();
        let ratings = self.lookup_ratings(names).await;

        let plan = compute_budget_plan(&request, |category, business| {
            ratings
                .get(&rating_key(category, &business.name))
                .copied()
                .flatten()
        });

        let saved = match EstimateRecord::budget(&request, &plan) {
            Ok(record) => self.store.record_estimate(&record).await,
            Err(error) => Err(error),
        };
        if let Err(error) = saved {
            warn!(error = %error, "failed to persist budget plan");
        }

        self.metrics.inc_budget_plan();
        self.metrics.observe_latency(started.elapsed());
        info!(
            total_score = plan.metrics.total_score,
            per_day = plan.metrics.per_day,
            rated = ratings.values().filter(|rating| rating.is_some()).count(),
            "budget plan computed"
        );

        Ok(plan)
    }

    #[instrument(skip(self, candidates), fields(candidates = candidates.len()))]
    pub async fn recommended_businesses(
        &self,
        category: BusinessCategory,
        tier: TierName,
        allocation: f64,
        candidates: &[Business],
        max_results: Option<usize>,
    ) -> Vec<RecommendedBusiness> {
        let ratings = self
            .lookup_ratings(
                candidates
                    .iter()
                    .map(|business| (category, business.name.as_str()))
                    .collect(),
            )
            .await;

        recommend_businesses(
            category,
            tier,
            allocation,
            candidates,
            |business| {
                ratings
                    .get(&rating_key(category, &business.name))
                    .copied()
                    .flatten()
            },
            max_results.unwrap_or(DEFAULT_MAX_RESULTS),
        )
    }

    /// Rating for one business, served from the cache when known.
    pub async fn rating(&self, category: BusinessCategory, name: &str) -> Option<f64> {
        if let Some(rating) = self.cache.get(category, name) {
            self.metrics.inc_rating_cache_hit();
            debug!(business = name, category = %category, rating, "rating cache hit");
            return Some(rating);
        }

        self.metrics.inc_rating_cache_miss();
        let lookup = self.ratings.fetch_rating(name, category).await;
        if let Some(rating) = lookup.rating {
            self.cache.insert(category, name, rating);
        }

        lookup.rating
    }

    async fn lookup_ratings(
        &self,
        mut names: Vec<(BusinessCategory, &str)>,
    ) -> HashMap<RatingKey, Option<f64>> {
        names.sort_by_key(|(category, name)| rating_key(*category, name));
        names.dedup_by_key(|(category, name)| rating_key(*category, name));

        let ratings = join_all(
            names
                .iter()
                .map(|(category, name)| self.rating(*category, name)),
        )
        .await;

        names
            .into_iter()
            .map(|(category, name)| rating_key(category, name))
            .zip(ratings)
            .collect()
    }
}
