//! Route handlers

pub mod admin;
pub mod bikes;
pub mod health;
pub mod rentals;
pub mod users;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};

use crate::api::error::ApiError;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}
