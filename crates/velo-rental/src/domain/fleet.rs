use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::availability::AvailabilityCoordinator;
use crate::domain::locks::LifecycleLocks;
use crate::domain::types::{Bike, BikeId, BikeUpdate, Coordinates, NewBike, PageRequest, Paginated};
use crate::error::{RentalError, Result};
use crate::storage::{BikeRepository, RentalRepository};

/// Rate applied when a bike is registered without one
pub const DEFAULT_PRICE_PER_MINUTE: Decimal = Decimal::from_parts(25, 0, 0, false, 2);

/// Highest accepted rate. Keeps every fare well inside the decimal range.
pub const MAX_PRICE_PER_MINUTE: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

fn validate_price(price: Decimal) -> Result<()> {
    if price <= Decimal::ZERO {
        return Err(RentalError::Validation {
            field: "price_per_minute".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    if price > MAX_PRICE_PER_MINUTE {
        return Err(RentalError::Validation {
            field: "price_per_minute".to_string(),
            message: format!("must not exceed {MAX_PRICE_PER_MINUTE}"),
        });
    }
    Ok(())
}

/// Bike registry operations for the admin surface and rider browsing
pub struct FleetManager {
    bikes: Arc<dyn BikeRepository>,
    rentals: Arc<dyn RentalRepository>,
    availability: Arc<AvailabilityCoordinator>,
    locks: Arc<LifecycleLocks>,
}

impl FleetManager {
    pub fn new(
        bikes: Arc<dyn BikeRepository>,
        rentals: Arc<dyn RentalRepository>,
        availability: Arc<AvailabilityCoordinator>,
        locks: Arc<LifecycleLocks>,
    ) -> Self {
        Self {
            bikes,
            rentals,
            availability,
            locks,
        }
    }

    pub async fn create_bike(
        &self,
        latitude: f64,
        longitude: f64,
        price_per_minute: Option<Decimal>,
    ) -> Result<Bike> {
        let location = Coordinates::validated(latitude, longitude)?;
        let price_per_minute = price_per_minute.unwrap_or(DEFAULT_PRICE_PER_MINUTE);
        validate_price(price_per_minute)?;

        let bike = self
            .bikes
            .create_bike(&NewBike {
                location,
                price_per_minute,
            })
            .await?;

        info!(bike_id = %bike.id, %location, price_per_minute = %bike.price_per_minute, "Bike registered");
        Ok(bike)
    }

    /// Edit a bike's location, rate and availability.
    ///
    /// Availability cannot be written while a rental is running on the bike.
    pub async fn update_bike(
        &self,
        bike_id: BikeId,
        update: BikeUpdate,
        is_available: Option<bool>,
    ) -> Result<Bike> {
        if let Some(latitude) = update.latitude {
            Coordinates::validated(latitude, 0.0)?;
        }
        if let Some(longitude) = update.longitude {
            Coordinates::validated(0.0, longitude)?;
        }
        if let Some(price) = update.price_per_minute {
            validate_price(price)?;
        }

        let _guard = self.locks.bike(bike_id).await;

        let mut bike = self
            .bikes
            .get_bike(bike_id)
            .await?
            .ok_or(RentalError::BikeNotFound { bike_id })?;

        if is_available.is_some() {
            if let Some(rental) = self.rentals.get_running_rental_by_bike(bike_id).await? {
                warn!(%bike_id, rental_id = %rental.id, "Refusing availability edit on bike in use");
                return Err(RentalError::BikeInUse { bike_id });
            }
        }

        if !update.is_empty() {
            bike = self
                .bikes
                .update_bike(bike_id, &update)
                .await?
                .ok_or(RentalError::BikeNotFound { bike_id })?;
        }

        if let Some(available) = is_available {
            self.availability.set_availability(bike_id, available).await?;
            bike.is_available = available;
        }

        info!(%bike_id, ?update, ?is_available, "Bike updated");
        Ok(bike)
    }

    pub async fn reconcile_bike(&self, bike_id: BikeId) -> Result<Bike> {
        let _guard = self.locks.bike(bike_id).await;
        self.availability.reconcile(bike_id).await?;
        self.bikes
            .get_bike(bike_id)
            .await?
            .ok_or(RentalError::BikeNotFound { bike_id })
    }

    pub async fn list_available(&self, page: PageRequest) -> Result<Paginated<Bike>> {
        let items = self.bikes.list_available_bikes(page).await?;
        let total = self.bikes.count_available_bikes().await?;
        Ok(Paginated { items, total, page })
    }

    pub async fn list_all(&self, page: PageRequest) -> Result<Paginated<Bike>> {
        let items = self.bikes.list_bikes(page).await?;
        let total = self.bikes.count_bikes().await?;
        Ok(Paginated { items, total, page })
    }
}
