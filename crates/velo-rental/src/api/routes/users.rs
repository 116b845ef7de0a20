//! Account registration, login and the rider's own profile

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};

use crate::api::auth::{AuthenticatedUser, IssuedToken};
use crate::api::error::Result;
use crate::api::types::{ApiResponse, LoginRequest, RegisterUserRequest, UpdateProfileRequest};
use crate::domain::types::User;
use crate::server::AppState;

type JsonBody<T> = std::result::Result<Json<T>, JsonRejection>;

pub async fn register(
    State(state): State<AppState>,
    body: JsonBody<RegisterUserRequest>,
) -> Result<Json<ApiResponse<User>>> {
    let Json(request) = body?;
    let user = state.users.register(request.into()).await?;
    Ok(Json(ApiResponse::new("User registered successfully", user)))
}

/// Exchange credentials for a bearer token
pub async fn login(
    State(state): State<AppState>,
    body: JsonBody<LoginRequest>,
) -> Result<Json<ApiResponse<IssuedToken>>> {
    let Json(request) = body?;
    let user = state
        .users
        .authenticate(&request.email, &request.password)
        .await?;
    let token = state.jwt.issue(&user)?;
    Ok(Json(ApiResponse::new("Login successful", token)))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<User>>> {
    let user = state.users.get_user(user_id).await?;
    Ok(Json(ApiResponse::new(
        "User profile retrieved successfully",
        user,
    )))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    body: JsonBody<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<User>>> {
    let Json(request) = body?;
    let user = state.users.update_user(user_id, request.into()).await?;
    Ok(Json(ApiResponse::new("Profile updated successfully", user)))
}
