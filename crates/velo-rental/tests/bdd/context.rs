use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use velo_rental::config::{AuthConfig, VeloConfig};
use velo_rental::domain::types::{Bike, BikeId, Coordinates, NewBike, UserId};
use velo_rental::domain::{
    AvailabilityCoordinator, FleetManager, Geofence, LifecycleLocks, ManualClock,
    RentalLifecycleManager,
};
use velo_rental::storage::{BikeRepository, InMemoryStore, RentalRepository};
use velo_rental::{build_router, AppState};

pub const JWT_SECRET: &str = "bdd-secret";
pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "s3cret";

/// Puerta del Sol
pub const MADRID: Coordinates = Coordinates {
    latitude: 40.416775,
    longitude: -3.703790,
};

/// About 400 m from `MADRID`
pub const MADRID_NEARBY: Coordinates = Coordinates {
    latitude: 40.420000,
    longitude: -3.700000,
};

pub const PARIS: Coordinates = Coordinates {
    latitude: 48.856614,
    longitude: 2.352222,
};

pub fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

pub fn test_config() -> VeloConfig {
    VeloConfig {
        auth: AuthConfig {
            jwt_secret: JWT_SECRET.to_string(),
            admin_username: ADMIN_USERNAME.to_string(),
            admin_password: ADMIN_PASSWORD.to_string(),
            // Smallest argon2 cost, to keep registration fast under test.
            password_memory_kib: 8,
            password_iterations: 1,
            ..AuthConfig::default()
        },
        ..VeloConfig::default()
    }
}

/// Domain services wired over a shared in-memory store and a manual clock.
pub struct TestContext {
    pub store: InMemoryStore,
    pub clock: Arc<ManualClock>,
    pub bikes: Arc<dyn BikeRepository>,
    pub rentals: Arc<dyn RentalRepository>,
    pub lifecycle: Arc<RentalLifecycleManager>,
    pub fleet: Arc<FleetManager>,
}

impl TestContext {
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        Self::with_repositories(store.clone(), Arc::new(store.clone()), Arc::new(store))
    }

    /// Context whose domain services use `bikes` instead of the plain store,
    /// so a scenario can inject storage faults.
    pub fn with_repositories(
        store: InMemoryStore,
        bikes: Arc<dyn BikeRepository>,
        rentals: Arc<dyn RentalRepository>,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(start_instant()));
        let locks = Arc::new(LifecycleLocks::new());
        let availability = Arc::new(AvailabilityCoordinator::new(bikes.clone(), rentals.clone()));

        let lifecycle = Arc::new(RentalLifecycleManager::new(
            bikes.clone(),
            rentals.clone(),
            availability.clone(),
            locks.clone(),
            clock.clone(),
            Geofence::default(),
        ));
        let fleet = Arc::new(FleetManager::new(
            bikes.clone(),
            rentals.clone(),
            availability,
            locks,
        ));

        Self {
            store,
            clock,
            bikes,
            rentals,
            lifecycle,
            fleet,
        }
    }

    pub async fn add_bike(&self, at: Coordinates, price_per_minute: Decimal) -> BikeId {
        self.store
            .create_bike(&NewBike {
                location: at,
                price_per_minute,
            })
            .await
            .expect("Failed to create bike")
            .id
    }

    pub async fn bike(&self, bike_id: BikeId) -> Bike {
        self.store
            .get_bike(bike_id)
            .await
            .expect("Failed to read bike")
            .expect("Bike should exist")
    }

    pub async fn running_rentals_for_bike(&self, bike_id: BikeId) -> usize {
        let all = self
            .store
            .list_rentals(velo_rental::domain::types::PageRequest::new(1, 1000))
            .await
            .expect("Failed to list rentals");
        all.iter()
            .filter(|r| r.bike_id == bike_id && r.is_running())
            .count()
    }

    pub fn advance(&self, minutes: i64) {
        self.clock.advance(Duration::minutes(minutes));
    }
}

/// HTTP harness over the full router with an in-memory store.
pub struct HttpContext {
    pub router: Router,
    pub clock: Arc<ManualClock>,
}

impl HttpContext {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(start_instant()));
        let state = AppState::in_memory(test_config(), clock.clone());
        Self {
            router: build_router(state),
            clock,
        }
    }

    pub fn rider_token(&self, user_id: i64) -> String {
        let claims = json!({
            "sub": user_id,
            "exp": (Utc::now() + Duration::hours(1)).timestamp(),
        });
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .expect("Failed to sign token")
    }

    pub fn admin_header() -> String {
        let encoded = STANDARD.encode(format!("{ADMIN_USERNAME}:{ADMIN_PASSWORD}"));
        format!("Basic {encoded}")
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        authorization: Option<String>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = authorization {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router call failed");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn as_rider(
        &self,
        user_id: i64,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let auth = format!("Bearer {}", self.rider_token(user_id));
        self.send(method, uri, Some(auth), body).await
    }

    pub async fn as_admin(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(method, uri, Some(Self::admin_header()), body).await
    }

    /// Register an account with valid names and return the response.
    pub async fn register(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/api/v1/users/register",
            None,
            Some(json!({
                "email": email,
                "password": password,
                "first_name": "Ana",
                "last_name": "Lopez",
            })),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/api/v1/users/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    /// Register and log in, returning the new user's id and bearer header.
    pub async fn sign_up(&self, email: &str) -> (i64, String) {
        let (status, body) = self.register(email, "pedal2024").await;
        assert_eq!(status, StatusCode::OK, "register failed: {body}");
        let user_id = body["data"]["id"].as_i64().expect("user id");

        let (status, body) = self.login(email, "pedal2024").await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        let token = body["data"]["token"].as_str().expect("token");
        (user_id, format!("Bearer {token}"))
    }

    /// Register a bike through the admin API and return its id.
    pub async fn create_bike(&self, at: Coordinates, price_per_minute: &str) -> i64 {
        let (status, body) = self
            .as_admin(
                "POST",
                "/api/v1/admin/bikes",
                Some(json!({
                    "latitude": at.latitude,
                    "longitude": at.longitude,
                    "price_per_minute": price_per_minute,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create bike failed: {body}");
        body["data"]["id"].as_i64().expect("bike id")
    }
}

pub fn user(id: i64) -> UserId {
    UserId::new(id)
}
