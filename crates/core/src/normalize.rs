//! Coercion of loosely-typed LLM output into typed primitives.
//!
//! Field names arrive with inconsistent casing, so every field is described by
//! an ordered table of candidate keys; the first key present with a non-null
//! value wins.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use unicode_segmentation::UnicodeSegmentation;
use url::Url;

pub const MIN_KEYS: &[&str] = &["Minimum", "min"];
pub const MAX_KEYS: &[&str] = &["Maximum", "max"];
pub const AVERAGE_KEYS: &[&str] = &["Average", "average"];
pub const CONFIDENCE_KEYS: &[&str] = &["Confidence", "confidence"];
pub const SOURCE_KEYS: &[&str] = &["Source", "source"];
pub const REFERENCE_KEYS: &[&str] = &["Examples", "References", "references"];

pub const PROVIDER_KEYS: &[&str] = &["provider", "Provider"];
pub const PROVIDER_FALLBACK_KEYS: &[&str] = &["airline", "Airline"];
pub const DETAILS_KEYS: &[&str] = &["details", "Details"];
pub const PRICE_KEYS: &[&str] = &["price", "Price"];
pub const PRICE_FALLBACK_KEYS: &[&str] = &["totalPrice", "TotalPrice"];
pub const LINK_KEYS: &[&str] = &["link", "Link", "url"];

pub const AIRLINE_KEYS: &[&str] = &["airline", "Airline"];
pub const OUTBOUND_KEYS: &[&str] = &["outbound", "Outbound"];
pub const INBOUND_KEYS: &[&str] = &["inbound", "Inbound"];
pub const OUTBOUND_DATE_KEYS: &[&str] = &["outboundDate", "OutboundDate", "departureDate"];
pub const INBOUND_DATE_KEYS: &[&str] = &["inboundDate", "InboundDate", "returnDate"];
pub const LAYOVER_KEYS: &[&str] = &["layovers", "Layovers", "stops"];
pub const DURATION_KEYS: &[&str] = &["duration", "Duration"];
pub const BAGGAGE_KEYS: &[&str] = &["baggage", "Baggage"];
pub const CLASS_KEYS: &[&str] = &["class", "Class", "cabin"];

static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"'()\[\]]+"#).expect("valid url regex"));

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹', '₩', '₪'];

pub fn lookup<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

/// Reads a non-negative finite number from a JSON number or numeric string.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => {
            let cleaned = text
                .trim()
                .trim_start_matches(CURRENCY_SYMBOLS)
                .replace(',', "");
            cleaned.trim().parse::<f64>().ok()?
        }
        _ => return None,
    };

    (number.is_finite() && number >= 0.0).then_some(number)
}

pub fn number_field(object: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    lookup(object, keys).and_then(coerce_number)
}

pub fn coerce_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => return None,
    };

    (!text.is_empty()).then_some(text)
}

pub fn string_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    lookup(object, keys).and_then(coerce_string)
}

/// Reads a small non-negative count such as a layover number.
pub fn coerce_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => {
            let count = number.as_f64()?;
            (count.is_finite() && count >= 0.0).then(|| count.round() as u32)
        }
        Value::String(text) => {
            let lower = text.trim().to_lowercase();
            if matches!(lower.as_str(), "nonstop" | "non-stop" | "direct" | "none") {
                return Some(0);
            }
            let digits = lower
                .chars()
                .skip_while(|ch| !ch.is_ascii_digit())
                .take_while(char::is_ascii_digit)
                .collect::<String>();
            digits.parse().ok()
        }
        _ => None,
    }
}

pub fn count_field(object: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    lookup(object, keys).and_then(coerce_count)
}

/// Pulls the first URL out of free text.
///
/// Returns the text with the URL removed and the URL itself. A match that does
/// not parse as an absolute URL is left in the text. Only text that lost a URL
/// is compacted; anything else is merely trimmed.
pub fn split_link(text: &str) -> (String, Option<String>) {
    let Some(found) = URL_PATTERN.find(text) else {
        return (text.trim().to_string(), None);
    };

    let candidate = found
        .as_str()
        .trim_end_matches(['.', ',', ';', ':', '!', '?']);
    if Url::parse(candidate).is_err() {
        return (text.trim().to_string(), None);
    }

    let mut remaining = String::with_capacity(text.len());
    remaining.push_str(&text[..found.start()]);
    remaining.push_str(&text[found.start() + candidate.len()..]);

    (compact_details(&remaining), Some(candidate.to_string()))
}

fn compact_details(text: &str) -> String {
    text.replace("()", "")
        .replace("[]", "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['-', '|', ':', '–'])
        .trim()
        .to_string()
}

/// Shortens text for logs and error messages without splitting graphemes.
pub fn preview(text: &str, max_graphemes: usize) -> String {
    let compact = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if compact.graphemes(true).count() <= max_graphemes {
        compact
    } else {
        compact.graphemes(true).take(max_graphemes).collect::<String>() + "..."
    }
}
