//! Request and response bodies for the HTTP API

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::config::PaginationConfig;
use crate::domain::types::{BikeUpdate, PageRequest, Paginated};
use crate::domain::users::{AccountChanges, Registration};

/// Standard success envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

/// Success envelope for list endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub message: String,
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(message: impl Into<String>, page: Paginated<T>) -> Self {
        let total_pages = page.total_pages();
        Self {
            message: message.into(),
            total: page.total,
            page: page.page.page,
            limit: page.page.limit,
            total_pages,
            data: page.items,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn resolve(&self, config: &PaginationConfig) -> Result<PageRequest, ApiError> {
        let page = self.page.unwrap_or(1);
        if page < 1 {
            return Err(ApiError::validation("page must be at least 1"));
        }

        let limit = self.limit.unwrap_or(config.default_limit);
        if limit < 1 || limit > config.max_limit {
            return Err(ApiError::validation(format!(
                "limit must be between 1 and {}",
                config.max_limit
            )));
        }

        Ok(PageRequest::new(page, limit))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartRentalRequest {
    pub bike_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EndRentalRequest {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateBikeRequest {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub price_per_minute: Option<Decimal>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateBikeRequest {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub price_per_minute: Option<Decimal>,
    #[serde(default)]
    pub is_available: Option<bool>,
}

impl UpdateBikeRequest {
    pub fn split(self) -> (BikeUpdate, Option<bool>) {
        (
            BikeUpdate {
                latitude: self.latitude,
                longitude: self.longitude,
                price_per_minute: self.price_per_minute,
            },
            self.is_available,
        )
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateRentalRequest {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl From<RegisterUserRequest> for Registration {
    fn from(request: RegisterUserRequest) -> Self {
        Registration {
            email: request.email,
            password: request.password,
            first_name: request.first_name,
            last_name: request.last_name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Rider self-service edit. Passwords are not changed here.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl From<UpdateProfileRequest> for AccountChanges {
    fn from(request: UpdateProfileRequest) -> Self {
        AccountChanges {
            email: request.email,
            password: None,
            first_name: request.first_name,
            last_name: request.last_name,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AdminUpdateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl From<AdminUpdateUserRequest> for AccountChanges {
    fn from(request: AdminUpdateUserRequest) -> Self {
        AccountChanges {
            email: request.email,
            password: request.password,
            first_name: request.first_name,
            last_name: request.last_name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub version: String,
    pub database: String,
}
