//! HTTP API for riders and administrators

pub mod auth;
pub mod error;
pub mod routes;
pub mod types;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::server::AppState;

/// Routes mounted under `/api/v1`
pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/users/register", post(routes::users::register))
        .route("/users/login", post(routes::users::login));

    let rider = Router::new()
        .route(
            "/users/profile",
            get(routes::users::get_profile).patch(routes::users::update_profile),
        )
        .route("/bikes/available", get(routes::bikes::list_available_bikes))
        .route("/rentals/start", post(routes::rentals::start_rental))
        .route("/rentals/end", post(routes::rentals::end_rental))
        .route("/rentals/history", get(routes::rentals::rental_history))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::rider_auth));

    let admin = Router::new()
        .route(
            "/bikes",
            get(routes::admin::list_bikes).post(routes::admin::create_bike),
        )
        .route("/bikes/:id", patch(routes::admin::update_bike))
        .route("/bikes/:id/reconcile", post(routes::admin::reconcile_bike))
        .route("/rentals", get(routes::admin::list_rentals))
        .route(
            "/rentals/:id",
            get(routes::admin::get_rental).patch(routes::admin::update_rental),
        )
        .route("/users", get(routes::admin::list_users))
        .route(
            "/users/:id",
            get(routes::admin::get_user).patch(routes::admin::update_user),
        )
        .route_layer(middleware::from_fn_with_state(state, auth::admin_auth));

    Router::new().merge(public).merge(rider).nest("/admin", admin)
}
