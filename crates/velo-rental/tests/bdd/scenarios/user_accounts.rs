use crate::context::{HttpContext, MADRID};
use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn test_registered_rider_rents_with_issued_token() {
    let http = HttpContext::new();
    let (user_id, bearer) = http.sign_up("ana@example.com").await;
    let bike_id = http.create_bike(MADRID, "0.5").await;

    let (status, body) = http
        .send(
            "POST",
            "/api/v1/rentals/start",
            Some(bearer.clone()),
            Some(json!({ "bike_id": bike_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["user_id"], user_id);

    let (status, body) = http
        .send("GET", "/api/v1/rentals/history", Some(bearer), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_registration_rules() {
    let http = HttpContext::new();

    let (status, body) = http.register("Ana@Example.com", "pedal2024").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User registered successfully");
    assert_eq!(body["data"]["email"], "ana@example.com");
    assert_eq!(body["data"]["first_name"], "Ana");
    assert!(body["data"].get("password_hash").is_none());

    let (status, body) = http.register("ana@example.com", "another99").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "EMAIL_ALREADY_EXISTS");
    assert_eq!(body["error"]["message"], "Email already in use");

    for (email, password) in [
        ("not-an-email", "pedal2024"),
        ("ben@example.com", "short1"),
        ("ben@example.com", "lettersonly"),
        ("", "pedal2024"),
    ] {
        let (status, body) = http.register(email, password).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{email} / {password}");
        assert_eq!(error_code(&body), "VALIDATION_ERROR");
    }

    let (status, _) = http
        .send(
            "POST",
            "/api/v1/users/register",
            None,
            Some(json!({
                "email": "ben@example.com",
                "password": "pedal2024",
                "first_name": "B3n",
                "last_name": "Smith",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = http.as_admin("GET", "/api/v1/admin/users", None).await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_login_failures_look_the_same() {
    let http = HttpContext::new();
    http.sign_up("ana@example.com").await;

    let (status, body) = http.login("ana@example.com", "wrong-pass1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "INVALID_CREDENTIALS");
    let wrong_password = body["error"]["message"].clone();

    let (status, body) = http.login("nobody@example.com", "pedal2024").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], wrong_password);
    assert_eq!(wrong_password, "Invalid email or password");

    let (status, body) = http.login("ANA@example.com", "pedal2024").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");
    assert!(body["data"]["expires_at"].is_string());
}

#[tokio::test]
async fn test_rider_profile() {
    let http = HttpContext::new();
    let (user_id, bearer) = http.sign_up("ana@example.com").await;
    http.sign_up("ben@example.com").await;

    let (status, _) = http.send("GET", "/api/v1/users/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = http
        .send("GET", "/api/v1/users/profile", Some(bearer.clone()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User profile retrieved successfully");
    assert_eq!(body["data"]["id"], user_id);

    let (status, body) = http
        .send("PATCH", "/api/v1/users/profile", Some(bearer.clone()), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (status, body) = http
        .send(
            "PATCH",
            "/api/v1/users/profile",
            Some(bearer.clone()),
            Some(json!({ "email": "BEN@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "EMAIL_ALREADY_EXISTS");

    let (status, body) = http
        .send(
            "PATCH",
            "/api/v1/users/profile",
            Some(bearer.clone()),
            Some(json!({ "last_name": "Lopez-Garcia", "password": "ignored99" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Profile updated successfully");
    assert_eq!(body["data"]["last_name"], "Lopez-Garcia");
    assert_eq!(body["data"]["email"], "ana@example.com");

    // The profile endpoint cannot change the password.
    let (status, _) = http.login("ana@example.com", "pedal2024").await;
    assert_eq!(status, StatusCode::OK);

    // A validly signed token for an account that does not exist.
    let (status, body) = http.as_rider(999, "GET", "/api/v1/users/profile", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "USER_NOT_FOUND");
}

#[tokio::test]
async fn test_admin_user_management() {
    let http = HttpContext::new();
    let (ana, _) = http.sign_up("ana@example.com").await;
    let (_, ben_bearer) = http.sign_up("ben@example.com").await;

    let (status, _) = http
        .send("GET", "/api/v1/admin/users", Some(ben_bearer), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = http
        .as_admin("GET", "/api/v1/admin/users?page=1&limit=1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["data"][0]["id"], ana);
    assert!(body["data"][0].get("password_hash").is_none());

    let (status, body) = http
        .as_admin("GET", &format!("/api/v1/admin/users/{ana}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "ana@example.com");

    let (status, body) = http.as_admin("GET", "/api/v1/admin/users/404", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "USER_NOT_FOUND");

    let (status, _) = http.as_admin("GET", "/api/v1/admin/users/0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = http
        .as_admin(
            "PATCH",
            &format!("/api/v1/admin/users/{ana}"),
            Some(json!({ "password": "reset2024", "first_name": "Anita" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User updated successfully");
    assert_eq!(body["data"]["first_name"], "Anita");

    let (status, _) = http.login("ana@example.com", "pedal2024").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = http.login("ana@example.com", "reset2024").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = http
        .as_admin(
            "PATCH",
            &format!("/api/v1/admin/users/{ana}"),
            Some(json!({ "password": "weak" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
}
