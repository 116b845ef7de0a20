//! Rider rental endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Extension, Json,
};
use tracing::debug;

use crate::api::auth::AuthenticatedUser;
use crate::api::error::{ApiError, Result};
use crate::api::types::{
    ApiResponse, EndRentalRequest, PageQuery, PaginatedResponse, StartRentalRequest,
};
use crate::domain::types::{BikeId, Coordinates, Rental};
use crate::server::AppState;

pub async fn start_rental(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    body: std::result::Result<Json<StartRentalRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Rental>>> {
    let Json(request) = body?;
    if request.bike_id <= 0 {
        return Err(ApiError::validation("bike_id must be a positive integer"));
    }

    debug!(%user_id, bike_id = request.bike_id, "Start rental requested");
    let rental = state
        .rentals
        .start_rental(user_id, BikeId::new(request.bike_id))
        .await?;

    Ok(Json(ApiResponse::new("Rental started successfully", rental)))
}

pub async fn end_rental(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    body: std::result::Result<Json<EndRentalRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Rental>>> {
    let Json(request) = body?;
    Coordinates::validated(request.latitude, request.longitude)
        .map_err(|e| ApiError::validation(e.to_string()))?;

    let rental = state
        .rentals
        .end_rental(user_id, request.latitude, request.longitude)
        .await?;

    Ok(Json(ApiResponse::new("Rental ended successfully", rental)))
}

/// The caller's rentals, newest first
pub async fn rental_history(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    query: std::result::Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<PaginatedResponse<Rental>>> {
    let Query(query) = query?;
    let page = query.resolve(&state.config.pagination)?;
    let history = state.rentals.rental_history(user_id, page).await?;
    Ok(Json(PaginatedResponse::new(
        "Rental history retrieved successfully",
        history,
    )))
}
