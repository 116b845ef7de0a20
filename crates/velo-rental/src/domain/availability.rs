use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::types::BikeId;
use crate::error::{RentalError, Result};
use crate::storage::{BikeRepository, RentalRepository};

/// Single authority over a bike's availability flag.
///
/// Callers are expected to hold the bike's lifecycle lock.
pub struct AvailabilityCoordinator {
    bikes: Arc<dyn BikeRepository>,
    rentals: Arc<dyn RentalRepository>,
}

impl AvailabilityCoordinator {
    pub fn new(bikes: Arc<dyn BikeRepository>, rentals: Arc<dyn RentalRepository>) -> Self {
        Self { bikes, rentals }
    }

    pub async fn is_available(&self, bike_id: BikeId) -> Result<bool> {
        let bike = self
            .bikes
            .get_bike(bike_id)
            .await?
            .ok_or(RentalError::BikeNotFound { bike_id })?;
        Ok(bike.is_available)
    }

    pub async fn set_availability(&self, bike_id: BikeId, available: bool) -> Result<()> {
        self.bikes.set_bike_availability(bike_id, available).await?;
        debug!(%bike_id, available, "Bike availability updated");
        Ok(())
    }

    /// Recompute the flag from rental state and write it back.
    ///
    /// Returns the resulting availability.
    pub async fn reconcile(&self, bike_id: BikeId) -> Result<bool> {
        let bike = self
            .bikes
            .get_bike(bike_id)
            .await?
            .ok_or(RentalError::BikeNotFound { bike_id })?;

        let running = self.rentals.get_running_rental_by_bike(bike_id).await?;
        let expected = running.is_none();

        if bike.is_available != expected {
            self.bikes.set_bike_availability(bike_id, expected).await?;
            info!(
                %bike_id,
                was = bike.is_available,
                now = expected,
                rental_id = ?running.map(|r| r.id),
                "Reconciled bike availability"
            );
        }
        Ok(expected)
    }
}
