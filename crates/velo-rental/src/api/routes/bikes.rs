use axum::extract::{Query, State};
use axum::Json;

use crate::api::error::Result;
use crate::api::types::{PageQuery, PaginatedResponse};
use crate::domain::types::Bike;
use crate::server::AppState;

/// List bikes that can be rented right now
pub async fn list_available_bikes(
    State(state): State<AppState>,
    query: std::result::Result<Query<PageQuery>, axum::extract::rejection::QueryRejection>,
) -> Result<Json<PaginatedResponse<Bike>>> {
    let Query(query) = query?;
    let page = query.resolve(&state.config.pagination)?;
    let bikes = state.fleet.list_available(page).await?;
    Ok(Json(PaginatedResponse::new(
        "Available bikes retrieved successfully",
        bikes,
    )))
}
