use serde_json::{Map, Value};
use tracing::warn;

use crate::error::EstimateError;
use crate::extract::extract_json;
use crate::models::{
    CategoryEstimate, ExpenseCategory, FlightReference, Reference, Tier, TierReference,
};
use crate::normalize::{
    count_field, lookup, number_field, split_link, string_field, AIRLINE_KEYS, AVERAGE_KEYS,
    BAGGAGE_KEYS, CLASS_KEYS, CONFIDENCE_KEYS, DETAILS_KEYS, DURATION_KEYS, INBOUND_DATE_KEYS,
    INBOUND_KEYS, LAYOVER_KEYS, LINK_KEYS, MAX_KEYS, MIN_KEYS, OUTBOUND_DATE_KEYS, OUTBOUND_KEYS,
    PRICE_FALLBACK_KEYS, PRICE_KEYS, PROVIDER_FALLBACK_KEYS, PROVIDER_KEYS, REFERENCE_KEYS,
    SOURCE_KEYS,
};

/// Turns a raw search reply into the three tiers of one category.
///
/// Tiers are read from the category's section first (`{"flight": {"budget": ..}}`)
/// and then from the top level. A reply without a JSON object is a failure of
/// the whole category.
pub fn parse_category_response(
    category: ExpenseCategory,
    raw: &str,
) -> Result<CategoryEstimate, EstimateError> {
    let candidate = extract_json(raw);
    let Ok(Value::Object(parsed)) = serde_json::from_str::<Value>(&candidate) else {
        return Err(EstimateError::UnparseableResponse {
            category,
            raw: raw.to_string(),
        });
    };

    let section = lookup(&parsed, category.response_keys()).and_then(Value::as_object);

    Ok(CategoryEstimate::from_fn(|tier| {
        let keys = [tier.as_str(), tier.capitalized()];
        let raw_tier = section
            .and_then(|section| lookup(section, &keys))
            .or_else(|| lookup(&parsed, &keys));
        normalize_tier(raw_tier, category)
    }))
}

/// Produces a fully populated tier from whatever the LLM returned for it.
///
/// Missing or malformed fields fall back to defaults instead of failing; an
/// absent or non-object tier yields [`Tier::default`].
pub fn normalize_tier(raw: Option<&Value>, category: ExpenseCategory) -> Tier {
    let Some(object) = raw.and_then(Value::as_object) else {
        return Tier::default();
    };

    let confidence = number_field(object, CONFIDENCE_KEYS)
        .map(|value| value.clamp(0.0, 1.0))
        .unwrap_or(Tier::DEFAULT_CONFIDENCE);

    let references = lookup(object, REFERENCE_KEYS)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| normalize_reference(entry, category))
                .collect()
        })
        .unwrap_or_default();

    let tier = Tier {
        min: number_field(object, MIN_KEYS).unwrap_or(0.0),
        max: number_field(object, MAX_KEYS).unwrap_or(0.0),
        average: number_field(object, AVERAGE_KEYS).unwrap_or(0.0),
        confidence,
        source: string_field(object, SOURCE_KEYS)
            .unwrap_or_else(|| Tier::DEFAULT_SOURCE.to_string()),
        references,
    };

    if !tier.is_consistent() {
        warn!(
            category = %category,
            min = tier.min,
            average = tier.average,
            max = tier.max,
            "tier bounds out of order"
        );
    }

    tier
}

/// Normalizes one reference entry. Entries that are neither text nor objects
/// are dropped.
pub fn normalize_reference(entry: &Value, category: ExpenseCategory) -> Option<TierReference> {
    match entry {
        Value::String(text) => {
            let (details, link) = split_link(text);
            let base = Reference {
                details,
                link,
                ..Reference::default()
            };
            Some(specialize(base, None, category))
        }
        Value::Object(object) => {
            let base = generic_reference(object);
            Some(specialize(base, Some(object), category))
        }
        _ => None,
    }
}

fn generic_reference(object: &Map<String, Value>) -> Reference {
    let provider = string_field(object, PROVIDER_KEYS)
        .or_else(|| string_field(object, PROVIDER_FALLBACK_KEYS))
        .unwrap_or_else(|| "Unknown".to_string());
    let price = number_field(object, PRICE_KEYS)
        .or_else(|| number_field(object, PRICE_FALLBACK_KEYS))
        .unwrap_or(0.0);
    let raw_details = string_field(object, DETAILS_KEYS).unwrap_or_default();

    let (details, link) = match string_field(object, LINK_KEYS) {
        Some(link) => (raw_details, Some(link)),
        None => split_link(&raw_details),
    };

    Reference {
        provider,
        details,
        price,
        link,
    }
}

fn specialize(
    base: Reference,
    object: Option<&Map<String, Value>>,
    category: ExpenseCategory,
) -> TierReference {
    if category != ExpenseCategory::Flight {
        return TierReference::Generic(base);
    }

    let mut flight = FlightReference::from_base(base);
    if let Some(object) = object {
        if let Some(airline) = string_field(object, AIRLINE_KEYS) {
            flight.airline = airline;
        }
        flight.outbound = string_field(object, OUTBOUND_KEYS);
        flight.inbound = string_field(object, INBOUND_KEYS);
        flight.outbound_date = string_field(object, OUTBOUND_DATE_KEYS);
        flight.inbound_date = string_field(object, INBOUND_DATE_KEYS);
        flight.layovers = count_field(object, LAYOVER_KEYS).unwrap_or(0);
        flight.duration = string_field(object, DURATION_KEYS);
        flight.baggage = string_field(object, BAGGAGE_KEYS);
        flight.cabin_class = string_field(object, CLASS_KEYS);
    }

    TierReference::Flight(flight)
}
