//! Rating-weighted budget distribution.
//!
//! Everything here is pure: ratings are resolved by the caller and passed in
//! through a lookup closure, so the scoring can be exercised without I/O.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::{
    BudgetAllocation, BudgetMetrics, BudgetPlan, BudgetRequest, Business, BusinessCategory,
    RecommendedBusiness, ScoreDistribution, TierName,
};

pub const GLOBAL_MIN_RATING: f64 = 3.0;
pub const PREFERENCE_BOOST: f64 = 1.5;
pub const LOW_RATING_PENALTY: f64 = 0.5;
pub const DEFAULT_MAX_RESULTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierWeight {
    pub weight: f64,
    pub min_rating: f64,
}

pub fn tier_weight(category: BusinessCategory, tier: TierName) -> TierWeight {
    let (weight, min_rating) = match (category, tier) {
        (BusinessCategory::Flight, TierName::Budget) => (30.0, 3.0),
        (BusinessCategory::Flight, TierName::Medium) => (25.0, 3.5),
        (BusinessCategory::Flight, TierName::Premium) => (20.0, 4.0),
        (BusinessCategory::Hotel, TierName::Budget) => (25.0, 3.0),
        (BusinessCategory::Hotel, TierName::Medium) => (30.0, 3.5),
        (BusinessCategory::Hotel, TierName::Premium) => (35.0, 4.0),
        (BusinessCategory::Restaurant, TierName::Budget) => (15.0, 3.0),
        (BusinessCategory::Restaurant, TierName::Medium) => (20.0, 3.5),
        (BusinessCategory::Restaurant, TierName::Premium) => (25.0, 4.0),
        (BusinessCategory::Activity, TierName::Budget) => (10.0, 3.0),
        (BusinessCategory::Activity, TierName::Medium) => (15.0, 3.5),
        (BusinessCategory::Activity, TierName::Premium) => (20.0, 4.0),
    };

    TierWeight { weight, min_rating }
}

/// `(rating / 5) * weight`, halved below the tier's minimum rating. An unknown
/// rating contributes nothing.
pub fn business_score(category: BusinessCategory, tier: TierName, rating: Option<f64>) -> f64 {
    let Some(rating) = rating else {
        return 0.0;
    };

    let TierWeight { weight, min_rating } = tier_weight(category, tier);
    let score = (rating / 5.0) * weight;
    if rating < min_rating {
        score * LOW_RATING_PENALTY
    } else {
        score
    }
}

/// Share of each tier in its category total; all zero when the total is zero.
pub fn tier_shares(scores: &BTreeMap<TierName, f64>) -> BTreeMap<TierName, f64> {
    let total: f64 = scores.values().sum();

    TierName::ALL
        .into_iter()
        .map(|tier| {
            let score = scores.get(&tier).copied().unwrap_or(0.0);
            let share = if total > 0.0 { score / total } else { 0.0 };
            (tier, share)
        })
        .collect()
}

pub fn compute_budget_plan<F>(request: &BudgetRequest, rating_of: F) -> BudgetPlan
where
    F: Fn(BusinessCategory, &Business) -> Option<f64>,
{
    let mut distribution = ScoreDistribution::new();

    for (category, tiers) in &request.businesses {
        let scores = TierName::ALL
            .into_iter()
            .map(|tier| {
                let mut score: f64 = tiers
                    .get(&tier)
                    .map(|businesses| {
                        businesses
                            .iter()
                            .map(|business| {
                                business_score(*category, tier, rating_of(*category, business))
                            })
                            .sum()
                    })
                    .unwrap_or(0.0);

                if request.preferences.get(category) == Some(&tier) {
                    score *= PREFERENCE_BOOST;
                }

                (tier, score)
            })
            .collect::<BTreeMap<_, _>>();

        distribution.insert(*category, scores);
    }

    let duration = f64::from(request.duration);
    let travelers = f64::from(request.travelers);
    let budget_per_day = request.total_budget / duration;

    let allocations = distribution
        .iter()
        .map(|(category, scores)| {
            let amounts = tier_shares(scores)
                .into_iter()
                .map(|(tier, share)| {
                    let amount = (budget_per_day * share * duration * travelers).round() as i64;
                    (tier, amount)
                })
                .collect::<BTreeMap<_, _>>();
            (*category, amounts)
        })
        .collect::<BudgetAllocation>();

    let total_score: f64 = distribution
        .values()
        .flat_map(|scores| scores.values())
        .sum();

    BudgetPlan {
        allocations,
        metrics: BudgetMetrics {
            total_score,
            distribution,
            per_day: budget_per_day,
            per_person: request.total_budget / travelers,
        },
    }
}

/// Whether a business can be recommended for a tier's allocation.
pub fn validate_budget_fit(
    category: BusinessCategory,
    tier: TierName,
    rating: Option<f64>,
    price: f64,
    allocation: f64,
) -> bool {
    let Some(rating) = rating else {
        return false;
    };

    if rating < GLOBAL_MIN_RATING || price > allocation {
        return false;
    }

    tier != TierName::Premium || rating >= tier_weight(category, tier).min_rating
}

pub fn recommend_businesses<F>(
    category: BusinessCategory,
    tier: TierName,
    allocation: f64,
    candidates: &[Business],
    rating_of: F,
    max_results: usize,
) -> Vec<RecommendedBusiness>
where
    F: Fn(&Business) -> Option<f64>,
{
    let mut recommended = candidates
        .iter()
        .filter_map(|business| {
            let rating = rating_of(business);
            if !validate_budget_fit(category, tier, rating, business.price, allocation) {
                return None;
            }
            let rating = rating?;
            Some(RecommendedBusiness {
                name: business.name.clone(),
                price: business.price,
                rating,
                score: business_score(category, tier, Some(rating)),
            })
        })
        .collect::<Vec<_>>();

    recommended.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    recommended.truncate(max_results);
    recommended
}
