use crate::domain::types::{BikeId, RentalId, RentalStatus, UserId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RentalError {
    #[error("User {user_id} already has an active rental")]
    UserHasActiveRental { user_id: UserId },

    #[error("Bike {bike_id} is not available for rental")]
    BikeNotAvailable { bike_id: BikeId },

    #[error("Bike {bike_id} not found")]
    BikeNotFound { bike_id: BikeId },

    #[error("User {user_id} has no active rental")]
    NoActiveRental { user_id: UserId },

    #[error("End location is {distance_km:.3} km from the start location (limit {max_km} km)")]
    EndLocationTooFar { distance_km: f64, max_km: f64 },

    #[error("Rental {id} not found")]
    RentalNotFound { id: RentalId },

    #[error("Bike {bike_id} has a running rental")]
    BikeInUse { bike_id: BikeId },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: RentalStatus, to: RentalStatus },

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("User {user_id} not found")]
    UserNotFound { user_id: UserId },

    #[error("Email already in use")]
    EmailAlreadyExists { email: String },

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Database error during {operation}: {source}")]
    DatabaseError {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Inconsistent state: {message}")]
    InconsistentState { message: String },

    #[error("Password hashing failed: {message}")]
    PasswordHashing { message: String },
}

pub type Result<T> = std::result::Result<T, RentalError>;

impl RentalError {
    pub fn database(
        operation: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        RentalError::DatabaseError {
            operation: operation.into(),
            source: source.into(),
        }
    }

    /// Rejections a rider or admin can act on, as opposed to faults.
    pub fn is_expected(&self) -> bool {
        !self.is_internal()
    }

    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            RentalError::DatabaseError { .. }
                | RentalError::InconsistentState { .. }
                | RentalError::PasswordHashing { .. }
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RentalError::UserHasActiveRental { .. } => "USER_HAS_ACTIVE_RENTAL",
            RentalError::BikeNotAvailable { .. } => "BIKE_NOT_AVAILABLE",
            RentalError::BikeNotFound { .. } => "BIKE_NOT_FOUND",
            RentalError::NoActiveRental { .. } => "NO_ACTIVE_RENTAL",
            RentalError::EndLocationTooFar { .. } => "END_LOCATION_TOO_FAR",
            RentalError::RentalNotFound { .. } => "RENTAL_NOT_FOUND",
            RentalError::BikeInUse { .. } => "BIKE_IN_USE",
            RentalError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            RentalError::Validation { .. } => "VALIDATION_ERROR",
            RentalError::UserNotFound { .. } => "USER_NOT_FOUND",
            RentalError::EmailAlreadyExists { .. } => "EMAIL_ALREADY_EXISTS",
            RentalError::InvalidCredentials => "INVALID_CREDENTIALS",
            RentalError::DatabaseError { .. }
            | RentalError::InconsistentState { .. }
            | RentalError::PasswordHashing { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<sqlx::Error> for RentalError {
    fn from(err: sqlx::Error) -> Self {
        RentalError::database("query", err)
    }
}
