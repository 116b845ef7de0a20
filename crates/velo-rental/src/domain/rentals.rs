use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::availability::AvailabilityCoordinator;
use crate::domain::clock::Clock;
use crate::domain::fare::Fare;
use crate::domain::geofence::Geofence;
use crate::domain::locks::LifecycleLocks;
use crate::domain::types::{
    BikeId, Coordinates, NewRental, PageRequest, Paginated, Rental, RentalCompletion, RentalId,
    RentalStatus, UserId,
};
use crate::error::{RentalError, Result};
use crate::storage::{BikeRepository, RentalRepository};

#[async_trait]
pub trait RentalOperations: Send + Sync {
    async fn start_rental(&self, user_id: UserId, bike_id: BikeId) -> Result<Rental>;

    async fn end_rental(&self, user_id: UserId, latitude: f64, longitude: f64) -> Result<Rental>;

    /// Administrative close: no geofence check and no charge.
    async fn force_end(&self, rental_id: RentalId) -> Result<Rental>;

    /// Drive a rental to `status`, treating a no-op as success.
    async fn apply_status(&self, rental_id: RentalId, status: RentalStatus) -> Result<Rental>;

    async fn get_rental(&self, rental_id: RentalId) -> Result<Rental>;

    async fn rental_history(&self, user_id: UserId, page: PageRequest)
        -> Result<Paginated<Rental>>;

    async fn list_rentals(&self, page: PageRequest) -> Result<Paginated<Rental>>;
}

/// Owns every running -> ended transition and the bike availability flips
/// that go with it.
pub struct RentalLifecycleManager {
    bikes: Arc<dyn BikeRepository>,
    rentals: Arc<dyn RentalRepository>,
    availability: Arc<AvailabilityCoordinator>,
    locks: Arc<LifecycleLocks>,
    clock: Arc<dyn Clock>,
    geofence: Geofence,
}

impl RentalLifecycleManager {
    pub fn new(
        bikes: Arc<dyn BikeRepository>,
        rentals: Arc<dyn RentalRepository>,
        availability: Arc<AvailabilityCoordinator>,
        locks: Arc<LifecycleLocks>,
        clock: Arc<dyn Clock>,
        geofence: Geofence,
    ) -> Self {
        Self {
            bikes,
            rentals,
            availability,
            locks,
            clock,
            geofence,
        }
    }

    async fn start_locked(&self, user_id: UserId, bike_id: BikeId) -> Result<Rental> {
        let _guard = self.locks.user_then_bike(user_id, bike_id).await;

        if self.rentals.has_running_rental(user_id).await? {
            return Err(RentalError::UserHasActiveRental { user_id });
        }

        if !self.availability.is_available(bike_id).await? {
            return Err(RentalError::BikeNotAvailable { bike_id });
        }

        let bike = self
            .bikes
            .get_bike(bike_id)
            .await?
            .ok_or(RentalError::BikeNotFound { bike_id })?;

        let rental = self
            .rentals
            .create_rental(&NewRental {
                user_id,
                bike_id,
                start: bike.location(),
                start_time: self.clock.now(),
            })
            .await?;

        self.write_availability(bike_id, false).await?;
        Ok(rental)
    }

    async fn end_locked(&self, user_id: UserId, end: Coordinates) -> Result<Rental> {
        let user_guard = self.locks.user(user_id).await;

        let rental = self
            .rentals
            .get_running_rental_by_user(user_id)
            .await?
            .ok_or(RentalError::NoActiveRental { user_id })?;

        // The user lock pins the running rental, so its bike cannot change.
        let _guard = self.locks.extend_with_bike(user_guard, rental.bike_id).await;

        let distance_km = self.geofence.check(rental.start_location(), end)?;

        let bike = self.bikes.get_bike(rental.bike_id).await?.ok_or_else(|| {
            RentalError::InconsistentState {
                message: format!(
                    "rental {} references missing bike {}",
                    rental.id, rental.bike_id
                ),
            }
        })?;

        let end_time = self.clock.now();
        let fare = Fare::calculate(rental.start_time, end_time, bike.price_per_minute)?;

        let ended = self
            .rentals
            .end_rental_record(
                rental.id,
                &RentalCompletion {
                    end,
                    end_time,
                    duration_minutes: fare.duration_minutes,
                    cost: fare.cost,
                },
            )
            .await?;

        self.write_availability(rental.bike_id, true).await?;

        info!(
            rental_id = %ended.id,
            distance_km,
            duration_minutes = fare.duration_minutes,
            "Rental closed within geofence"
        );
        Ok(ended)
    }

    async fn force_end_locked(&self, rental_id: RentalId) -> Result<Rental> {
        let snapshot = self.get_rental(rental_id).await?;
        let _guard = self
            .locks
            .user_then_bike(snapshot.user_id, snapshot.bike_id)
            .await;

        // Re-read under the locks; a rider may have ended it meanwhile.
        let rental = self.get_rental(rental_id).await?;
        if !rental.status.can_transition_to(RentalStatus::Ended) {
            return Err(RentalError::InvalidStateTransition {
                from: rental.status,
                to: RentalStatus::Ended,
            });
        }

        let end_time = self.clock.now();
        let fare = Fare::waived(rental.start_time, end_time);

        let ended = self
            .rentals
            .end_rental_record(
                rental.id,
                &RentalCompletion {
                    end: rental.start_location(),
                    end_time,
                    duration_minutes: fare.duration_minutes,
                    cost: fare.cost,
                },
            )
            .await?;

        self.write_availability(rental.bike_id, true).await?;
        Ok(ended)
    }

    /// Write the availability flag, reconciling once if the write fails.
    ///
    /// The write error is always returned; reconciliation is best effort.
    async fn write_availability(&self, bike_id: BikeId, available: bool) -> Result<()> {
        let Err(err) = self.availability.set_availability(bike_id, available).await else {
            return Ok(());
        };

        error!(%bike_id, available, error = %err, "Availability write failed, reconciling");
        match self.availability.reconcile(bike_id).await {
            Ok(now_available) => warn!(
                %bike_id,
                is_available = now_available,
                "Bike availability reconciled after failed write"
            ),
            Err(reconcile_err) => error!(
                %bike_id,
                error = %reconcile_err,
                "Bike availability reconciliation failed; admin reconcile required"
            ),
        }
        Err(err)
    }
}

#[async_trait]
impl RentalOperations for RentalLifecycleManager {
    async fn start_rental(&self, user_id: UserId, bike_id: BikeId) -> Result<Rental> {
        let result = self.start_locked(user_id, bike_id).await;
        match &result {
            Ok(rental) => info!(
                %user_id,
                %bike_id,
                rental_id = %rental.id,
                "Rental started"
            ),
            Err(e) if e.is_expected() => warn!(%user_id, %bike_id, error = %e, "Rental start rejected"),
            Err(e) => error!(%user_id, %bike_id, error = %e, "Rental start failed"),
        }
        result
    }

    async fn end_rental(&self, user_id: UserId, latitude: f64, longitude: f64) -> Result<Rental> {
        let result = match Coordinates::validated(latitude, longitude) {
            Ok(end) => self.end_locked(user_id, end).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(rental) => info!(
                %user_id,
                bike_id = %rental.bike_id,
                rental_id = %rental.id,
                cost = %rental.cost.unwrap_or_default(),
                "Rental ended"
            ),
            Err(e) if e.is_expected() => warn!(%user_id, error = %e, "Rental end rejected"),
            Err(e) => error!(%user_id, error = %e, "Rental end failed"),
        }
        result
    }

    async fn force_end(&self, rental_id: RentalId) -> Result<Rental> {
        let result = self.force_end_locked(rental_id).await;
        match &result {
            Ok(rental) => info!(
                %rental_id,
                user_id = %rental.user_id,
                bike_id = %rental.bike_id,
                duration_minutes = ?rental.duration_minutes,
                "Rental force-ended by admin"
            ),
            Err(e) if e.is_expected() => warn!(%rental_id, error = %e, "Force end rejected"),
            Err(e) => error!(%rental_id, error = %e, "Force end failed"),
        }
        result
    }

    async fn apply_status(&self, rental_id: RentalId, status: RentalStatus) -> Result<Rental> {
        let current = self.get_rental(rental_id).await?;
        if current.status == status {
            return Ok(current);
        }
        if !current.status.can_transition_to(status) {
            warn!(%rental_id, from = %current.status, to = %status, "Rejected status change");
            return Err(RentalError::InvalidStateTransition {
                from: current.status,
                to: status,
            });
        }

        match self.force_end(rental_id).await {
            // Ended by its rider between the read above and the lock.
            Err(RentalError::InvalidStateTransition {
                from: RentalStatus::Ended,
                ..
            }) => self.get_rental(rental_id).await,
            other => other,
        }
    }

    async fn get_rental(&self, rental_id: RentalId) -> Result<Rental> {
        self.rentals
            .get_rental(rental_id)
            .await?
            .ok_or(RentalError::RentalNotFound { id: rental_id })
    }

    async fn rental_history(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Paginated<Rental>> {
        let items = self.rentals.list_rentals_by_user(user_id, page).await?;
        let total = self.rentals.count_rentals_by_user(user_id).await?;
        Ok(Paginated { items, total, page })
    }

    async fn list_rentals(&self, page: PageRequest) -> Result<Paginated<Rental>> {
        let items = self.rentals.list_rentals(page).await?;
        let total = self.rentals.count_rentals().await?;
        Ok(Paginated { items, total, page })
    }
}
