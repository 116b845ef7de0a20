//! Admin endpoints for the bike fleet, rental records and rider accounts

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use tracing::info;

use crate::api::error::{ApiError, Result};
use crate::api::types::{
    AdminUpdateUserRequest, ApiResponse, CreateBikeRequest, PageQuery, PaginatedResponse,
    UpdateBikeRequest, UpdateRentalRequest,
};
use crate::domain::types::{Bike, BikeId, Rental, RentalId, RentalStatus, User, UserId};
use crate::server::AppState;

type JsonBody<T> = std::result::Result<Json<T>, JsonRejection>;
type IdPath = std::result::Result<Path<i64>, PathRejection>;
type PageParams = std::result::Result<Query<PageQuery>, QueryRejection>;

fn positive_id(path: IdPath) -> Result<i64> {
    let Path(id) = path?;
    if id <= 0 {
        return Err(ApiError::validation("id must be a positive integer"));
    }
    Ok(id)
}

pub async fn list_bikes(
    State(state): State<AppState>,
    query: PageParams,
) -> Result<Json<PaginatedResponse<Bike>>> {
    let Query(query) = query?;
    let page = query.resolve(&state.config.pagination)?;
    let bikes = state.fleet.list_all(page).await?;
    Ok(Json(PaginatedResponse::new("Bikes retrieved successfully", bikes)))
}

pub async fn create_bike(
    State(state): State<AppState>,
    body: JsonBody<CreateBikeRequest>,
) -> Result<Json<ApiResponse<Bike>>> {
    let Json(request) = body?;
    let bike = state
        .fleet
        .create_bike(request.latitude, request.longitude, request.price_per_minute)
        .await?;
    Ok(Json(ApiResponse::new("Bike created successfully", bike)))
}

pub async fn update_bike(
    State(state): State<AppState>,
    id: IdPath,
    body: JsonBody<UpdateBikeRequest>,
) -> Result<Json<ApiResponse<Bike>>> {
    let bike_id = BikeId::new(positive_id(id)?);
    let Json(request) = body?;
    let (update, is_available) = request.split();

    let bike = state.fleet.update_bike(bike_id, update, is_available).await?;
    Ok(Json(ApiResponse::new("Bike updated successfully", bike)))
}

/// Recompute a bike's availability from its rentals
pub async fn reconcile_bike(
    State(state): State<AppState>,
    id: IdPath,
) -> Result<Json<ApiResponse<Bike>>> {
    let bike_id = BikeId::new(positive_id(id)?);
    let bike = state.fleet.reconcile_bike(bike_id).await?;
    info!(%bike_id, is_available = bike.is_available, "Admin reconciled bike");
    Ok(Json(ApiResponse::new("Bike availability reconciled", bike)))
}

pub async fn list_rentals(
    State(state): State<AppState>,
    query: PageParams,
) -> Result<Json<PaginatedResponse<Rental>>> {
    let Query(query) = query?;
    let page = query.resolve(&state.config.pagination)?;
    let rentals = state.rentals.list_rentals(page).await?;
    Ok(Json(PaginatedResponse::new(
        "Rentals retrieved successfully",
        rentals,
    )))
}

pub async fn get_rental(
    State(state): State<AppState>,
    id: IdPath,
) -> Result<Json<ApiResponse<Rental>>> {
    let rental_id = RentalId::new(positive_id(id)?);
    let rental = state.rentals.get_rental(rental_id).await?;
    Ok(Json(ApiResponse::new("Rental retrieved successfully", rental)))
}

/// Status changes are routed through the lifecycle manager.
pub async fn update_rental(
    State(state): State<AppState>,
    id: IdPath,
    body: JsonBody<UpdateRentalRequest>,
) -> Result<Json<ApiResponse<Rental>>> {
    let rental_id = RentalId::new(positive_id(id)?);
    let Json(request) = body?;

    let rental = match request.status {
        Some(raw) => {
            let status: RentalStatus = raw.parse()?;
            state.rentals.apply_status(rental_id, status).await?
        }
        None => state.rentals.get_rental(rental_id).await?,
    };

    Ok(Json(ApiResponse::new("Rental updated successfully", rental)))
}

pub async fn list_users(
    State(state): State<AppState>,
    query: PageParams,
) -> Result<Json<PaginatedResponse<User>>> {
    let Query(query) = query?;
    let page = query.resolve(&state.config.pagination)?;
    let users = state.users.list_users(page).await?;
    Ok(Json(PaginatedResponse::new("Users retrieved successfully", users)))
}

pub async fn get_user(
    State(state): State<AppState>,
    id: IdPath,
) -> Result<Json<ApiResponse<User>>> {
    let user_id = UserId::new(positive_id(id)?);
    let user = state.users.get_user(user_id).await?;
    Ok(Json(ApiResponse::new("User retrieved successfully", user)))
}

/// Admins may also reset a rider's password.
pub async fn update_user(
    State(state): State<AppState>,
    id: IdPath,
    body: JsonBody<AdminUpdateUserRequest>,
) -> Result<Json<ApiResponse<User>>> {
    let user_id = UserId::new(positive_id(id)?);
    let Json(request) = body?;
    let user = state.users.update_user(user_id, request.into()).await?;
    info!(%user_id, "Admin updated user");
    Ok(Json(ApiResponse::new("User updated successfully", user)))
}
