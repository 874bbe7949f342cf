use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::error::EstimateError;

/// Serializes under [`ExpenseCategory::as_key`]; deserializes through
/// [`ExpenseCategory::parse`] so every accepted spelling lives in one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExpenseCategory {
    Flight,
    Accommodation,
    Food,
    CarRental,
    Activities,
}

impl ExpenseCategory {
    pub const ALL: [Self; 5] = [
        Self::Flight,
        Self::Accommodation,
        Self::Food,
        Self::CarRental,
        Self::Activities,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        let compact = value
            .trim()
            .to_lowercase()
            .replace(['_', '-', ' '], "");

        match compact.as_str() {
            "flight" | "flights" | "airfare" => Some(Self::Flight),
            "accommodation" | "accommodations" | "hotel" | "hotels" | "lodging" => {
                Some(Self::Accommodation)
            }
            "food" | "dining" | "meals" | "restaurant" | "restaurants" => Some(Self::Food),
            "carrental" | "car" | "rentalcar" | "carhire" => Some(Self::CarRental),
            "activities" | "activity" | "attractions" | "tours" => Some(Self::Activities),
            _ => None,
        }
    }

    /// Key the category is published under in prompts and responses.
    pub fn as_key(self) -> &'static str {
        match self {
            Self::Flight => "flight",
            Self::Accommodation => "accommodation",
            Self::Food => "food",
            Self::CarRental => "carRental",
            Self::Activities => "activities",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Flight => "round-trip or one-way flights",
            Self::Accommodation => "accommodation (hotels, guesthouses, apartments) per night",
            Self::Food => "food and dining per person per day",
            Self::CarRental => "car rental per day",
            Self::Activities => "activities, tours and attractions per person",
        }
    }

    /// Keys an LLM response may file this category under, most likely first.
    pub fn response_keys(self) -> &'static [&'static str] {
        match self {
            Self::Flight => &["flight", "flights", "Flight", "Flights"],
            Self::Accommodation => &["accommodation", "Accommodation", "hotels", "hotel"],
            Self::Food => &["food", "Food", "dining"],
            Self::CarRental => &["carRental", "car_rental", "CarRental", "carrental"],
            Self::Activities => &["activities", "Activities", "activity"],
        }
    }
}

impl<'de> Deserialize<'de> for ExpenseCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value)
            .ok_or_else(|| de::Error::custom(format!("unknown expense category '{value}'")))
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierName {
    Budget,
    Medium,
    Premium,
}

impl TierName {
    pub const ALL: [Self; 3] = [Self::Budget, Self::Medium, Self::Premium];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "budget" | "economy" | "low" => Some(Self::Budget),
            "medium" | "mid" | "standard" => Some(Self::Medium),
            "premium" | "luxury" | "high" => Some(Self::Premium),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Budget => "budget",
            Self::Medium => "medium",
            Self::Premium => "premium",
        }
    }

    pub fn capitalized(self) -> &'static str {
        match self {
            Self::Budget => "Budget",
            Self::Medium => "Medium",
            Self::Premium => "Premium",
        }
    }
}

impl fmt::Display for TierName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartureLocation {
    pub name: String,
    #[serde(default)]
    pub is_round_trip: bool,
    #[serde(default)]
    pub outbound_date: Option<NaiveDate>,
    #[serde(default)]
    pub inbound_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripParameters {
    #[serde(alias = "destination")]
    pub country: String,
    pub travelers: u32,
    pub currency: String,
    #[serde(default, alias = "departureLocation")]
    pub departure: Option<DepartureLocation>,
    #[serde(default, alias = "selectedCategories")]
    pub categories: BTreeSet<ExpenseCategory>,
}

impl TripParameters {
    /// Checks the request and returns it with the currency code upper-cased.
    pub fn validated(mut self) -> Result<Self, EstimateError> {
        self.country = self.country.trim().to_string();
        if self.country.is_empty() {
            return Err(EstimateError::invalid_parameters("country is required"));
        }

        if self.travelers == 0 {
            return Err(EstimateError::invalid_parameters(
                "travelers must be at least 1",
            ));
        }

        let currency = self.currency.trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_alphabetic()) {
            return Err(EstimateError::invalid_parameters(format!(
                "currency must be a 3-letter code, got '{}'",
                self.currency
            )));
        }
        self.currency = currency;

        if let Some(departure) = self.departure.as_mut() {
            departure.name = departure.name.trim().to_string();
            if departure.name.is_empty() {
                return Err(EstimateError::invalid_parameters(
                    "departure location name is required",
                ));
            }
            if let (Some(outbound), Some(inbound)) =
                (departure.outbound_date, departure.inbound_date)
            {
                if inbound < outbound {
                    return Err(EstimateError::invalid_parameters(
                        "inbound date precedes outbound date",
                    ));
                }
            }
        }

        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reference {
    pub provider: String,
    pub details: String,
    pub price: f64,
    pub link: Option<String>,
}

impl Default for Reference {
    fn default() -> Self {
        Self {
            provider: "Unknown".to_string(),
            details: String::new(),
            price: 0.0,
            link: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightReference {
    #[serde(flatten)]
    pub base: Reference,
    pub airline: String,
    pub outbound: Option<String>,
    pub inbound: Option<String>,
    pub outbound_date: Option<String>,
    pub inbound_date: Option<String>,
    pub layovers: u32,
    pub duration: Option<String>,
    pub baggage: Option<String>,
    #[serde(rename = "class")]
    pub cabin_class: Option<String>,
}

impl FlightReference {
    /// Flight reference with every itinerary field at its default.
    pub fn from_base(base: Reference) -> Self {
        Self {
            airline: base.provider.clone(),
            base,
            outbound: None,
            inbound: None,
            outbound_date: None,
            inbound_date: None,
            layovers: 0,
            duration: None,
            baggage: None,
            cabin_class: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TierReference {
    Generic(Reference),
    Flight(FlightReference),
}

impl TierReference {
    pub fn base(&self) -> &Reference {
        match self {
            Self::Generic(reference) => reference,
            Self::Flight(flight) => &flight.base,
        }
    }

    pub fn as_flight(&self) -> Option<&FlightReference> {
        match self {
            Self::Flight(flight) => Some(flight),
            Self::Generic(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tier {
    pub min: f64,
    pub max: f64,
    pub average: f64,
    pub confidence: f64,
    pub source: String,
    pub references: Vec<TierReference>,
}

impl Tier {
    pub const DEFAULT_CONFIDENCE: f64 = 0.7;
    pub const DEFAULT_SOURCE: &'static str = "default";

    pub fn is_consistent(&self) -> bool {
        self.min <= self.average && self.average <= self.max
    }
}

impl Default for Tier {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            average: 0.0,
            confidence: Self::DEFAULT_CONFIDENCE,
            source: Self::DEFAULT_SOURCE.to_string(),
            references: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryEstimate {
    pub budget: Tier,
    pub medium: Tier,
    pub premium: Tier,
}

impl CategoryEstimate {
    pub fn from_fn(mut build: impl FnMut(TierName) -> Tier) -> Self {
        Self {
            budget: build(TierName::Budget),
            medium: build(TierName::Medium),
            premium: build(TierName::Premium),
        }
    }

    pub fn tier(&self, name: TierName) -> &Tier {
        match name {
            TierName::Budget => &self.budget,
            TierName::Medium => &self.medium,
            TierName::Premium => &self.premium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Flights,
    Hotels,
    Full,
}

impl RequestType {
    pub fn parse(value: &str) -> Result<Self, EstimateError> {
        match value.trim().to_lowercase().as_str() {
            "flights" => Ok(Self::Flights),
            "hotels" => Ok(Self::Hotels),
            "full" => Ok(Self::Full),
            _ => Err(EstimateError::InvalidRequestType(value.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flights => "flights",
            Self::Hotels => "hotels",
            Self::Full => "full",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TravelEstimate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flights: Option<CategoryEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotels: Option<CategoryEstimate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ResponseEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessCategory {
    #[serde(alias = "flights", alias = "airline")]
    Flight,
    #[serde(alias = "hotels", alias = "accommodation")]
    Hotel,
    #[serde(alias = "restaurants", alias = "food")]
    Restaurant,
    #[serde(alias = "activities")]
    Activity,
}

impl BusinessCategory {
    pub const ALL: [Self; 4] = [Self::Flight, Self::Hotel, Self::Restaurant, Self::Activity];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "flight" | "flights" | "airline" => Some(Self::Flight),
            "hotel" | "hotels" | "accommodation" => Some(Self::Hotel),
            "restaurant" | "restaurants" | "food" => Some(Self::Restaurant),
            "activity" | "activities" => Some(Self::Activity),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flight => "flight",
            Self::Hotel => "hotel",
            Self::Restaurant => "restaurant",
            Self::Activity => "activity",
        }
    }
}

impl fmt::Display for BusinessCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub name: String,
    pub price: f64,
}

pub type BusinessMap = BTreeMap<BusinessCategory, BTreeMap<TierName, Vec<Business>>>;
pub type BudgetAllocation = BTreeMap<BusinessCategory, BTreeMap<TierName, i64>>;
pub type ScoreDistribution = BTreeMap<BusinessCategory, BTreeMap<TierName, f64>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetRequest {
    pub total_budget: f64,
    #[serde(default)]
    pub preferences: BTreeMap<BusinessCategory, TierName>,
    #[serde(default)]
    pub businesses: BusinessMap,
    pub duration: u32,
    pub travelers: u32,
}

impl BudgetRequest {
    pub fn validate(&self) -> Result<(), EstimateError> {
        if !self.total_budget.is_finite() || self.total_budget < 0.0 {
            return Err(EstimateError::invalid_parameters(
                "totalBudget must be a non-negative number",
            ));
        }
        if self.duration == 0 {
            return Err(EstimateError::invalid_parameters(
                "duration must be at least 1 day",
            ));
        }
        if self.travelers == 0 {
            return Err(EstimateError::invalid_parameters(
                "travelers must be at least 1",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetMetrics {
    pub total_score: f64,
    pub distribution: ScoreDistribution,
    pub per_day: f64,
    pub per_person: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetPlan {
    pub allocations: BudgetAllocation,
    pub metrics: BudgetMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendedBusiness {
    pub name: String,
    pub price: f64,
    pub rating: f64,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn trip() -> TripParameters {
        TripParameters {
            country: " Portugal ".to_string(),
            travelers: 2,
            currency: "eur".to_string(),
            departure: Some(DepartureLocation {
                name: "Boston".to_string(),
                is_round_trip: true,
                outbound_date: NaiveDate::from_ymd_opt(2026, 6, 1),
                inbound_date: NaiveDate::from_ymd_opt(2026, 6, 10),
            }),
            categories: BTreeSet::new(),
        }
    }

    fn budget_request(total_budget: f64) -> BudgetRequest {
        BudgetRequest {
            total_budget,
            preferences: BTreeMap::new(),
            businesses: BTreeMap::new(),
            duration: 3,
            travelers: 1,
        }
    }

    #[test]
    fn valid_trip_is_trimmed_and_currency_upper_cased() {
        let params = trip().validated().unwrap();
        assert_eq!(params.country, "Portugal");
        assert_eq!(params.currency, "EUR");
    }

    #[test]
    fn blank_country_is_rejected() {
        let mut params = trip();
        params.country = "   ".to_string();

        let error = params.validated().unwrap_err();
        assert!(error.is_client_error());
        assert!(error.to_string().contains("country"));
    }

    #[test]
    fn currency_must_be_three_letters() {
        for currency in ["EURO", "E1R", "", "us"] {
            let mut params = trip();
            params.currency = currency.to_string();

            let error = params.validated().unwrap_err();
            assert!(error.to_string().contains("currency"), "{currency}");
        }
    }

    #[test]
    fn inbound_before_outbound_is_rejected() {
        let mut params = trip();
        if let Some(departure) = params.departure.as_mut() {
            departure.inbound_date = NaiveDate::from_ymd_opt(2026, 5, 20);
        }

        let error = params.validated().unwrap_err();
        assert!(error.to_string().contains("inbound date"));
    }

    #[test]
    fn same_day_return_is_accepted() {
        let mut params = trip();
        if let Some(departure) = params.departure.as_mut() {
            departure.inbound_date = departure.outbound_date;
        }

        assert!(params.validated().is_ok());
    }

    #[test]
    fn negative_or_non_finite_budget_is_rejected() {
        for total_budget in [-1.0, f64::NAN, f64::INFINITY] {
            let error = budget_request(total_budget).validate().unwrap_err();
            assert!(error.is_client_error(), "{total_budget}");
        }

        assert!(budget_request(0.0).validate().is_ok());
    }

    #[test]
    fn category_spellings_share_one_table() {
        let params: TripParameters = serde_json::from_value(json!({
            "country": "Portugal",
            "travelers": 1,
            "currency": "EUR",
            "selectedCategories": ["restaurant", "accommodations", "car rental", "carRental"]
        }))
        .unwrap();

        assert_eq!(
            params.categories,
            BTreeSet::from([
                ExpenseCategory::Accommodation,
                ExpenseCategory::Food,
                ExpenseCategory::CarRental,
            ])
        );

        for category in ExpenseCategory::ALL {
            let encoded = serde_json::to_value(category).unwrap();
            assert_eq!(encoded, json!(category.as_key()));
            assert_eq!(
                serde_json::from_value::<ExpenseCategory>(encoded).unwrap(),
                category
            );
        }

        assert!(serde_json::from_value::<ExpenseCategory>(json!("cruise")).is_err());
    }
}
