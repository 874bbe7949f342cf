use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::models::{BusinessCategory, DepartureLocation, ExpenseCategory, TripParameters};

pub const SYSTEM_PROMPT: &str = "You are a travel pricing researcher. Search current public prices and answer with structured JSON only.";

const JSON_ONLY_INSTRUCTION: &str = "Respond with ONLY the JSON object above. Do not add explanations, markdown, or any text before or after it.";

/// Builds the search prompt for one expense category.
///
/// Flights get an itinerary-specific prompt when a departure location is
/// known; every other case asks for all selected categories at once.
pub fn build_prompt(category: ExpenseCategory, params: &TripParameters) -> String {
    match (category, params.departure.as_ref()) {
        (ExpenseCategory::Flight, Some(departure)) => flight_prompt(departure, params),
        _ => general_prompt(category, params),
    }
}

fn flight_prompt(departure: &DepartureLocation, params: &TripParameters) -> String {
    let trip_type = if departure.is_round_trip {
        "round-trip"
    } else {
        "one-way"
    };
    let dates = travel_dates(departure);

    format!(
        r#"Find current {trip_type} flight prices from {origin} to {destination}.
Travel dates: {dates}.
Travelers: {travelers}.
Currency: {currency}.

Give total prices for all travelers in {currency}, split into budget, medium and premium options.
Return this exact JSON structure:
{{
  "searchDetails": {{
    "origin": "{origin}",
    "destination": "{destination}",
    "tripType": "{trip_type}",
    "dates": "{dates}",
    "travelers": {travelers},
    "currency": "{currency}"
  }},
  "flight": {{
    "budget": {flight_tier},
    "medium": {flight_tier},
    "premium": {flight_tier}
  }}
}}

{JSON_ONLY_INSTRUCTION}"#,
        origin = departure.name,
        destination = params.country,
        travelers = params.travelers,
        currency = params.currency,
        flight_tier = FLIGHT_TIER_SHAPE,
    )
}

fn general_prompt(category: ExpenseCategory, params: &TripParameters) -> String {
    let mut categories: BTreeSet<ExpenseCategory> = params.categories.clone();
    categories.insert(category);

    let wanted = categories
        .iter()
        .map(|category| format!("- {}: {}", category.as_key(), category.label()))
        .collect::<Vec<_>>()
        .join("\n");
    let shape = categories
        .iter()
        .map(|category| {
            format!(
                r#"  "{key}": {{
    "budget": {tier},
    "medium": {tier},
    "premium": {tier}
  }}"#,
                key = category.as_key(),
                tier = GENERIC_TIER_SHAPE,
            )
        })
        .collect::<Vec<_>>()
        .join(",\n");
    let dates = params
        .departure
        .as_ref()
        .map(travel_dates)
        .unwrap_or_else(|| "flexible".to_string());

    format!(
        r#"Estimate current travel costs in {destination} for {travelers} traveler(s).
Travel dates: {dates}.
Currency: {currency}.

Categories:
{wanted}

For each category give budget, medium and premium price ranges in {currency} with real example providers.
Return this exact JSON structure:
{{
{shape}
}}

{JSON_ONLY_INSTRUCTION}"#,
        destination = params.country,
        travelers = params.travelers,
        currency = params.currency,
    )
}

/// Prompt for the rating lookup collaborator.
pub fn build_rating_prompt(business_name: &str, category: BusinessCategory) -> String {
    format!(
        r#"Find the current average public review rating (on a 0 to 5 scale) for the {category} business "{business_name}".
Return this exact JSON structure:
{{ "rating": 4.3, "source": "where the rating was found" }}
Use null for rating if no reliable rating exists.

{JSON_ONLY_INSTRUCTION}"#
    )
}

fn travel_dates(departure: &DepartureLocation) -> String {
    match (departure.outbound_date, departure.inbound_date) {
        (Some(outbound), Some(inbound)) if departure.is_round_trip => {
            format!("{} to {}", format_date(outbound), format_date(inbound))
        }
        (Some(outbound), _) => format_date(outbound),
        _ => "flexible".to_string(),
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

const FLIGHT_TIER_SHAPE: &str = r#"{
      "min": 0,
      "max": 0,
      "average": 0,
      "confidence": 0.0,
      "source": "where prices were found",
      "references": [
        {
          "airline": "airline name",
          "price": 0,
          "details": "fare details",
          "link": "booking url",
          "outbound": "origin-destination route",
          "inbound": "return route or null",
          "outboundDate": "YYYY-MM-DD",
          "inboundDate": "YYYY-MM-DD or null",
          "layovers": 0,
          "duration": "total travel time",
          "baggage": "included baggage",
          "class": "cabin class"
        }
      ]
    }"#;

const GENERIC_TIER_SHAPE: &str = r#"{
      "min": 0,
      "max": 0,
      "average": 0,
      "confidence": 0.0,
      "source": "where prices were found",
      "references": [
        { "provider": "business name", "details": "what the price covers", "price": 0, "link": "optional url" }
      ]
    }"#;
