use crate::context::{HttpContext, MADRID, MADRID_NEARBY, PARIS};
use axum::http::StatusCode;
use chrono::Duration;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use velo_rental::domain::types::{Rental, RentalStatus};

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

fn rental(body: &Value) -> Rental {
    serde_json::from_value(body["data"].clone()).expect("data should be a rental")
}

#[tokio::test]
async fn test_status_endpoint_is_public() {
    let http = HttpContext::new();

    let (status, body) = http.send("GET", "/status", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "velo-rental");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_rider_routes_require_bearer_token() {
    let http = HttpContext::new();

    let (status, body) = http.send("GET", "/api/v1/bikes/available", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "UNAUTHORIZED");

    let (status, _) = http
        .send(
            "GET",
            "/api/v1/bikes/available",
            Some("Bearer not-a-jwt".to_string()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Admin credentials do not work on rider routes.
    let (status, _) = http
        .send(
            "GET",
            "/api/v1/rentals/history",
            Some(HttpContext::admin_header()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let http = HttpContext::new();
    let claims = json!({
        "sub": 1,
        "exp": (chrono::Utc::now() - Duration::minutes(5)).timestamp(),
    });
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(crate::context::JWT_SECRET.as_bytes()),
    )
    .unwrap();

    let (status, _) = http
        .send(
            "GET",
            "/api/v1/rentals/history",
            Some(format!("Bearer {token}")),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_require_basic_credentials() {
    let http = HttpContext::new();

    let (status, body) = http.send("GET", "/api/v1/admin/bikes", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "UNAUTHORIZED");

    let rider = format!("Bearer {}", http.rider_token(1));
    let (status, _) = http.send("GET", "/api/v1/admin/bikes", Some(rider), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = http.as_admin("GET", "/api/v1/admin/bikes", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_full_ride_over_http() {
    let http = HttpContext::new();
    let bike_id = http.create_bike(MADRID, "0.5").await;

    let (status, body) = http.as_rider(1, "GET", "/api/v1/bikes/available", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["id"], bike_id);
    assert_eq!(body["data"][0]["price_per_minute"], 0.5);

    let (status, body) = http
        .as_rider(
            1,
            "POST",
            "/api/v1/rentals/start",
            Some(json!({ "bike_id": bike_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Rental started successfully");
    let started = rental(&body);
    assert_eq!(started.status, RentalStatus::Running);

    let (_, body) = http.as_rider(2, "GET", "/api/v1/bikes/available", None).await;
    assert_eq!(body["total"], 0);

    http.clock.advance(Duration::minutes(30));

    let (status, body) = http
        .as_rider(
            1,
            "POST",
            "/api/v1/rentals/end",
            Some(json!({
                "latitude": MADRID_NEARBY.latitude,
                "longitude": MADRID_NEARBY.longitude,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Rental ended successfully");
    assert_eq!(body["data"]["cost"], 15.0);
    let ended = rental(&body);
    assert_eq!(ended.id, started.id);
    assert_eq!(ended.duration_minutes, Some(30));
    assert_eq!(ended.cost, Some(dec!(15)));

    let (status, body) = http.as_rider(1, "GET", "/api/v1/rentals/history", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 20);
    assert_eq!(body["total_pages"], 1);

    // History is per rider.
    let (_, body) = http.as_rider(2, "GET", "/api/v1/rentals/history", None).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_domain_errors_map_to_status_codes() {
    let http = HttpContext::new();
    let bike_id = http.create_bike(MADRID, "0.5").await;

    let (status, body) = http
        .as_rider(1, "POST", "/api/v1/rentals/start", Some(json!({ "bike_id": 9999 })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "BIKE_NOT_FOUND");

    let (status, body) = http
        .as_rider(
            1,
            "POST",
            "/api/v1/rentals/end",
            Some(json!({ "latitude": MADRID.latitude, "longitude": MADRID.longitude })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "NO_ACTIVE_RENTAL");

    let (status, _) = http
        .as_rider(1, "POST", "/api/v1/rentals/start", Some(json!({ "bike_id": bike_id })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = http
        .as_rider(2, "POST", "/api/v1/rentals/start", Some(json!({ "bike_id": bike_id })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "BIKE_NOT_AVAILABLE");

    let (status, body) = http
        .as_rider(1, "POST", "/api/v1/rentals/start", Some(json!({ "bike_id": bike_id })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "USER_HAS_ACTIVE_RENTAL");

    let (status, body) = http
        .as_rider(
            1,
            "POST",
            "/api/v1/rentals/end",
            Some(json!({ "latitude": PARIS.latitude, "longitude": PARIS.longitude })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "END_LOCATION_TOO_FAR");
}

#[tokio::test]
async fn test_malformed_requests_are_validation_errors() {
    let http = HttpContext::new();

    let cases = [
        ("POST", "/api/v1/rentals/start", Some(json!({ "bike_id": 0 }))),
        ("POST", "/api/v1/rentals/start", Some(json!({ "bike_id": "one" }))),
        ("POST", "/api/v1/rentals/start", None),
        (
            "POST",
            "/api/v1/rentals/end",
            Some(json!({ "latitude": 120.0, "longitude": 0.0 })),
        ),
        ("GET", "/api/v1/rentals/history?limit=0", None),
        ("GET", "/api/v1/rentals/history?limit=500", None),
        ("GET", "/api/v1/rentals/history?page=abc", None),
    ];

    for (method, uri, body) in cases {
        let (status, response) = http.as_rider(1, method, uri, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
        assert_eq!(error_code(&response), "VALIDATION_ERROR", "{method} {uri}");
    }
}

#[tokio::test]
async fn test_admin_bike_management() {
    let http = HttpContext::new();
    let bike_id = http.create_bike(MADRID, "0.5").await;

    let (status, body) = http
        .as_admin(
            "PATCH",
            &format!("/api/v1/admin/bikes/{bike_id}"),
            Some(json!({ "price_per_minute": "0.30", "is_available": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_available"], false);

    let (_, body) = http.as_rider(1, "GET", "/api/v1/bikes/available", None).await;
    assert_eq!(body["total"], 0);

    let (status, body) = http
        .as_admin("POST", &format!("/api/v1/admin/bikes/{bike_id}/reconcile"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_available"], true);

    let (status, body) = http
        .as_admin("PATCH", "/api/v1/admin/bikes/424242", Some(json!({ "is_available": true })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "BIKE_NOT_FOUND");

    let (status, _) = http
        .as_admin("PATCH", "/api/v1/admin/bikes/-3", Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = http
        .as_admin(
            "POST",
            "/api/v1/admin/bikes",
            Some(json!({ "latitude": 0.0, "longitude": 181.0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_admin_rental_status_changes() {
    let http = HttpContext::new();
    let bike_id = http.create_bike(MADRID, "0.5").await;
    let (_, body) = http
        .as_rider(7, "POST", "/api/v1/rentals/start", Some(json!({ "bike_id": bike_id })))
        .await;
    let rental_id = rental(&body).id;
    let path = format!("/api/v1/admin/rentals/{rental_id}");

    let (status, body) = http
        .as_admin("PATCH", &format!("/api/v1/admin/bikes/{bike_id}"), Some(json!({ "is_available": true })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "BIKE_IN_USE");

    let (status, body) = http
        .as_admin("PATCH", &path, Some(json!({ "status": "paused" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    http.clock.advance(Duration::minutes(20));
    let (status, body) = http
        .as_admin("PATCH", &path, Some(json!({ "status": "ended" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let ended = rental(&body);
    assert_eq!(ended.status, RentalStatus::Ended);
    assert_eq!(ended.cost, Some(dec!(0)));
    assert_eq!(ended.duration_minutes, Some(20));

    let (status, body) = http
        .as_admin("PATCH", &path, Some(json!({ "status": "running" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "INVALID_STATE_TRANSITION");

    let (status, body) = http.as_admin("GET", &path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rental(&body).status, RentalStatus::Ended);

    let (status, body) = http.as_admin("GET", "/api/v1/admin/rentals/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "RENTAL_NOT_FOUND");

    let (status, body) = http.as_admin("GET", "/api/v1/admin/rentals?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["limit"], 5);

    let (_, body) = http.as_rider(8, "GET", "/api/v1/bikes/available", None).await;
    assert_eq!(body["total"], 1);
}
