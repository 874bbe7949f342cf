use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use wayfare_core::{BusinessCategory, QueryError};
use wayfare_search::{FixedRatings, ScriptedClient};
use wayfare_tests::{get, post_json, scripted_app, send, TEST_API_KEY};

const FLIGHT_REPLY: &str = "```json\n{\"flight\":{\"budget\":{\"Minimum\":200,\"Maximum\":400,\"Average\":300,\"Confidence\":0.8,\"Source\":\"Skyscanner\",\"Examples\":[\"Delta $300 https://delta.com\"]}}}\n```";
const HOTEL_REPLY: &str = r#"{"accommodation": {"budget": {"min": 45, "max": 90, "average": 70, "references": [{"provider": "Booking.com", "details": "Guesthouse near Alfama", "price": "€65", "link": "https://booking.example/alfama"}]}}}"#;

fn trip() -> serde_json::Value {
    json!({
        "country": "Portugal",
        "travelers": 2,
        "currency": "EUR",
        "departureLocation": {
            "name": "Boston",
            "isRoundTrip": true,
            "outboundDate": "2026-05-01",
            "inboundDate": "2026-05-10"
        }
    })
}

#[tokio::test]
async fn health_is_public() {
    let app = scripted_app(ScriptedClient::new(), FixedRatings::new()).await;

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["capabilities"]["search_backend"], "scripted");
    assert_eq!(body["capabilities"]["store"], "memory");
}

#[tokio::test]
async fn travel_requires_api_key() {
    let app = scripted_app(ScriptedClient::new(), FixedRatings::new()).await;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/travel/flights")
        .header("content-type", "application/json")
        .body(Body::from(trip().to_string()))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn flights_request_returns_normalized_tiers() {
    let client = ScriptedClient::new().with_reply("flight", FLIGHT_REPLY);
    let app = scripted_app(client, FixedRatings::new()).await;

    let (status, body) = send(&app, post_json("/v1/travel/flights", &trip())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["timestamp"].is_string());

    let budget = &body["data"]["flights"]["budget"];
    assert_eq!(budget["min"], 200.0);
    assert_eq!(budget["confidence"], 0.8);
    assert_eq!(budget["references"][0]["provider"], "Unknown");
    assert_eq!(budget["references"][0]["link"], "https://delta.com");
    assert_eq!(budget["references"][0]["layovers"], 0);
    assert_eq!(body["data"]["flights"]["premium"]["confidence"], 0.7);
    assert!(body["data"].get("hotels").is_none());
}

#[tokio::test]
async fn full_request_is_all_or_nothing() {
    let client = ScriptedClient::new()
        .with_reply("flight", FLIGHT_REPLY)
        .with_reply("accommodation", "not json at all");
    let app = scripted_app(client, FixedRatings::new()).await;

    let (status, body) = send(&app, post_json("/v1/travel/full", &trip())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("accommodation"));
}

#[tokio::test]
async fn full_request_returns_both_and_is_recorded() {
    let client = ScriptedClient::new()
        .with_reply("flight", FLIGHT_REPLY)
        .with_reply("accommodation", HOTEL_REPLY);
    let app = scripted_app(client, FixedRatings::new()).await;

    let (status, body) = send(&app, post_json("/v1/travel/full", &trip())).await;
    assert_eq!(status, StatusCode::OK);
    let hotel = &body["data"]["hotels"]["budget"]["references"][0];
    assert_eq!(hotel["provider"], "Booking.com");
    assert_eq!(hotel["price"], 65.0);

    let (status, history) = send(&app, get("/v1/estimates/history?limit=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["data"].as_array().unwrap().len(), 1);
    assert_eq!(history["data"][0]["kind"], "travel_estimate");
}

#[tokio::test]
async fn unknown_request_type_is_bad_request() {
    let app = scripted_app(ScriptedClient::new(), FixedRatings::new()).await;

    let (status, body) = send(&app, post_json("/v1/travel/cruises", &trip())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("cruises"));
}

#[tokio::test]
async fn malformed_trip_is_bad_request() {
    let app = scripted_app(ScriptedClient::new(), FixedRatings::new()).await;

    let (status, _) = send(
        &app,
        post_json("/v1/travel/hotels", &json!({ "country": "Portugal" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unreadable_body_gets_failure_envelope() {
    let app = scripted_app(ScriptedClient::new(), FixedRatings::new()).await;

    let invalid_json = Request::builder()
        .method("POST")
        .uri("/v1/travel/hotels")
        .header("content-type", "application/json")
        .header("x-api-key", TEST_API_KEY)
        .body(Body::from(r#"{"country": "Portugal","#))
        .unwrap();
    let missing_content_type = Request::builder()
        .method("POST")
        .uri("/v1/budget/optimize")
        .header("x-api-key", TEST_API_KEY)
        .body(Body::from(r#"{"totalBudget": 1000}"#))
        .unwrap();

    for request in [invalid_json, missing_content_type] {
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("malformed request body"));
    }
}

#[tokio::test]
async fn category_spellings_match_the_cli() {
    let client = ScriptedClient::new().with_reply("accommodation", HOTEL_REPLY);
    let app = scripted_app(client, FixedRatings::new()).await;

    let mut trip = trip();
    trip["selectedCategories"] = json!(["restaurant", "accommodations"]);
    let (status, body) = send(&app, post_json("/v1/travel/hotels", &trip)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn upstream_failure_is_bad_gateway() {
    let client = ScriptedClient::new().with_failure(
        "accommodation",
        QueryError::Status {
            status: 503,
            body: "overloaded".to_string(),
        },
    );
    let app = scripted_app(client, FixedRatings::new()).await;

    let (status, _) = send(&app, post_json("/v1/travel/hotels", &trip())).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn budget_optimize_allocates_by_rating() {
    let ratings = FixedRatings::new().with_rating(BusinessCategory::Hotel, "A", 4.0);
    let app = scripted_app(ScriptedClient::new(), ratings).await;

    let request = json!({
        "totalBudget": 1000,
        "duration": 5,
        "travelers": 2,
        "preferences": {},
        "businesses": { "hotel": { "budget": [{ "name": "A", "price": 80 }] } }
    });
    let (status, body) = send(&app, post_json("/v1/budget/optimize", &request)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["allocations"]["hotel"]["budget"], 2000);
    assert_eq!(body["data"]["allocations"]["hotel"]["premium"], 0);
    assert_eq!(body["data"]["metrics"]["perDay"], 200.0);
    assert_eq!(body["data"]["metrics"]["perPerson"], 500.0);
}

#[tokio::test]
async fn budget_optimize_rejects_zero_duration() {
    let app = scripted_app(ScriptedClient::new(), FixedRatings::new()).await;

    let request = json!({ "totalBudget": 1000, "duration": 0, "travelers": 2 });
    let (status, _) = send(&app, post_json("/v1/budget/optimize", &request)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn recommendations_respect_allocation_and_rating() {
    let ratings = FixedRatings::new()
        .with_rating(BusinessCategory::Hotel, "Palacio", 4.8)
        .with_rating(BusinessCategory::Hotel, "Pensao", 3.6)
        .with_rating(BusinessCategory::Hotel, "Grand", 4.9);
    let app = scripted_app(ScriptedClient::new(), ratings).await;

    let request = json!({
        "category": "hotel",
        "tier": "premium",
        "allocation": 300,
        "candidates": [
            { "name": "Palacio", "price": 250 },
            { "name": "Pensao", "price": 90 },
            { "name": "Grand", "price": 900 }
        ]
    });
    let (status, body) = send(&app, post_json("/v1/budget/recommendations", &request)).await;

    assert_eq!(status, StatusCode::OK);
    let names = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["name"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Palacio"]);
}
