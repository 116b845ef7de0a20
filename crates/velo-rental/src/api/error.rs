//! HTTP error mapping

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::error::RentalError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Rental(#[from] RentalError),

    /// Malformed or out-of-range request input
    #[error("{message}")]
    Validation { message: String },

    /// Missing or rejected credentials
    #[error("{message}")]
    Unauthorized { message: String, challenge: &'static str },

    /// Server-side failure outside the domain, e.g. token signing
    #[error("{message}")]
    Internal { message: String },
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal {
            message: message.into(),
        }
    }

    pub fn bearer_unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            message: message.into(),
            challenge: "Bearer",
        }
    }

    pub fn admin_unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            message: message.into(),
            challenge: "Basic realm=\"velo-admin\"",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Rental(err) => match err {
                RentalError::UserHasActiveRental { .. }
                | RentalError::BikeNotAvailable { .. }
                | RentalError::NoActiveRental { .. }
                | RentalError::BikeInUse { .. }
                | RentalError::InvalidStateTransition { .. }
                | RentalError::EmailAlreadyExists { .. } => StatusCode::CONFLICT,
                RentalError::BikeNotFound { .. }
                | RentalError::RentalNotFound { .. }
                | RentalError::UserNotFound { .. } => StatusCode::NOT_FOUND,
                RentalError::EndLocationTooFar { .. } | RentalError::Validation { .. } => {
                    StatusCode::BAD_REQUEST
                }
                RentalError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                RentalError::DatabaseError { .. }
                | RentalError::InconsistentState { .. }
                | RentalError::PasswordHashing { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized { .. } => "UNAUTHORIZED",
            ApiError::Internal { .. } => "INTERNAL_ERROR",
            ApiError::Rental(err) => err.error_code(),
        }
    }

    /// Message safe to show a caller. Internal failures are never described.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Rental(err) if err.is_internal() => "Internal server error".to_string(),
            ApiError::Internal { .. } => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, code = self.error_code(), "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.public_message(),
                "timestamp": chrono::Utc::now(),
            }
        }));

        let mut response = (status, body).into_response();
        if let ApiError::Unauthorized { challenge, .. } = &self {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(*challenge));
        }
        response
    }
}
