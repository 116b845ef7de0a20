use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{RentalError, Result};

/// Rider identifier, as carried in the `sub` claim of the access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bike identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BikeId(i64);

impl BikeId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for BikeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rental identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RentalId(i64);

impl RentalId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RentalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;
pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;

/// A point on the globe in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Build coordinates, rejecting anything outside the geographic range.
    pub fn validated(latitude: f64, longitude: f64) -> Result<Self> {
        if !(MIN_LATITUDE..=MAX_LATITUDE).contains(&latitude) {
            return Err(RentalError::Validation {
                field: "latitude".to_string(),
                message: format!("must be between {MIN_LATITUDE} and {MAX_LATITUDE}"),
            });
        }
        if !(MIN_LONGITUDE..=MAX_LONGITUDE).contains(&longitude) {
            return Err(RentalError::Validation {
                field: "longitude".to_string(),
                message: format!("must be between {MIN_LONGITUDE} and {MAX_LONGITUDE}"),
            });
        }
        Ok(Self::new(latitude, longitude))
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Rental lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    Running,
    Ended,
}

impl RentalStatus {
    pub fn can_transition_to(&self, next: RentalStatus) -> bool {
        matches!((self, next), (RentalStatus::Running, RentalStatus::Ended))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RentalStatus::Running => "running",
            RentalStatus::Ended => "ended",
        }
    }
}

impl fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RentalStatus {
    type Err = RentalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "running" => Ok(RentalStatus::Running),
            "ended" => Ok(RentalStatus::Ended),
            other => Err(RentalError::Validation {
                field: "status".to_string(),
                message: format!("unknown rental status '{other}', expected 'running' or 'ended'"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bike {
    pub id: BikeId,
    pub is_available: bool,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_per_minute: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bike {
    pub fn location(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rental {
    pub id: RentalId,
    pub user_id: UserId,
    pub bike_id: BikeId,
    pub status: RentalStatus,
    pub start_time: DateTime<Utc>,
    pub start_latitude: f64,
    pub start_longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub cost: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rental {
    pub fn is_running(&self) -> bool {
        self.status == RentalStatus::Running
    }

    pub fn start_location(&self) -> Coordinates {
        Coordinates::new(self.start_latitude, self.start_longitude)
    }

    pub fn end_location(&self) -> Option<Coordinates> {
        match (self.end_latitude, self.end_longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }
}

/// Values needed to open a rental record
#[derive(Debug, Clone, PartialEq)]
pub struct NewRental {
    pub user_id: UserId,
    pub bike_id: BikeId,
    pub start: Coordinates,
    pub start_time: DateTime<Utc>,
}

/// Values written when a rental record is closed
#[derive(Debug, Clone, PartialEq)]
pub struct RentalCompletion {
    pub end: Coordinates,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub cost: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBike {
    pub location: Coordinates,
    pub price_per_minute: Decimal,
}

/// Partial bike edit. Availability is deliberately absent; it only changes
/// through the availability coordinator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BikeUpdate {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub price_per_minute: Option<Decimal>,
}

impl BikeUpdate {
    pub fn is_empty(&self) -> bool {
        self.latitude.is_none() && self.longitude.is_none() && self.price_per_minute.is_none()
    }
}

/// Registered rider account. The password hash never leaves the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

/// Partial account edit with the password already hashed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password_hash.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
    }
}

/// One-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

/// A page of results together with the total number of matching rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: PageRequest,
}

impl<T> Paginated<T> {
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.page.limit)).max(1)
    }
}
