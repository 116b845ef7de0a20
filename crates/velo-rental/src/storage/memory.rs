//! Process-local store backing every repository.
//!
//! Enforces the same one-running-rental-per-user, per-bike and unique-email
//! constraints as the SQLite schema so behaviour is identical across backends.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::types::{
    Bike, BikeId, BikeUpdate, NewBike, NewRental, NewUser, PageRequest, Rental,
    RentalCompletion, RentalId, RentalStatus, User, UserId, UserUpdate,
};
use crate::error::{RentalError, Result};
use crate::storage::{BikeRepository, HealthCheck, RentalRepository, UserRepository};

#[derive(Debug, Default)]
struct Tables {
    bikes: BTreeMap<BikeId, Bike>,
    rentals: BTreeMap<RentalId, Rental>,
    users: BTreeMap<UserId, User>,
    next_bike_id: i64,
    next_rental_id: i64,
    next_user_id: i64,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T>(items: impl Iterator<Item = T>, page: PageRequest) -> Vec<T> {
    items
        .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
        .take(page.limit as usize)
        .collect()
}

/// Newest first, matching the SQL ordering.
fn newest_first<'a>(rentals: impl Iterator<Item = &'a Rental>) -> Vec<&'a Rental> {
    let mut sorted: Vec<&Rental> = rentals.collect();
    sorted.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));
    sorted
}

#[async_trait]
impl BikeRepository for InMemoryStore {
    async fn get_bike(&self, id: BikeId) -> Result<Option<Bike>> {
        Ok(self.tables.read().await.bikes.get(&id).cloned())
    }

    async fn create_bike(&self, bike: &NewBike) -> Result<Bike> {
        let mut tables = self.tables.write().await;
        tables.next_bike_id += 1;
        let now = Utc::now();
        let created = Bike {
            id: BikeId::new(tables.next_bike_id),
            is_available: true,
            latitude: bike.location.latitude,
            longitude: bike.location.longitude,
            price_per_minute: bike.price_per_minute,
            created_at: now,
            updated_at: now,
        };
        tables.bikes.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_bike(&self, id: BikeId, update: &BikeUpdate) -> Result<Option<Bike>> {
        let mut tables = self.tables.write().await;
        let Some(bike) = tables.bikes.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(latitude) = update.latitude {
            bike.latitude = latitude;
        }
        if let Some(longitude) = update.longitude {
            bike.longitude = longitude;
        }
        if let Some(price) = update.price_per_minute {
            bike.price_per_minute = price;
        }
        bike.updated_at = Utc::now();
        Ok(Some(bike.clone()))
    }

    async fn set_bike_availability(&self, id: BikeId, available: bool) -> Result<()> {
        let mut tables = self.tables.write().await;
        let bike = tables
            .bikes
            .get_mut(&id)
            .ok_or(RentalError::BikeNotFound { bike_id: id })?;
        bike.is_available = available;
        bike.updated_at = Utc::now();
        Ok(())
    }

    async fn list_available_bikes(&self, page: PageRequest) -> Result<Vec<Bike>> {
        let tables = self.tables.read().await;
        Ok(paginate(
            tables.bikes.values().filter(|b| b.is_available).cloned(),
            page,
        ))
    }

    async fn count_available_bikes(&self) -> Result<u64> {
        let tables = self.tables.read().await;
        Ok(tables.bikes.values().filter(|b| b.is_available).count() as u64)
    }

    async fn list_bikes(&self, page: PageRequest) -> Result<Vec<Bike>> {
        let tables = self.tables.read().await;
        Ok(paginate(tables.bikes.values().cloned(), page))
    }

    async fn count_bikes(&self) -> Result<u64> {
        Ok(self.tables.read().await.bikes.len() as u64)
    }
}

#[async_trait]
impl RentalRepository for InMemoryStore {
    async fn has_running_rental(&self, user_id: UserId) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .rentals
            .values()
            .any(|r| r.user_id == user_id && r.is_running()))
    }

    async fn create_rental(&self, rental: &NewRental) -> Result<Rental> {
        let mut tables = self.tables.write().await;

        if !tables.bikes.contains_key(&rental.bike_id) {
            return Err(RentalError::database(
                "create_rental",
                format!("FOREIGN KEY constraint failed: bike {}", rental.bike_id),
            ));
        }
        for existing in tables.rentals.values().filter(|r| r.is_running()) {
            if existing.user_id == rental.user_id {
                return Err(RentalError::UserHasActiveRental {
                    user_id: rental.user_id,
                });
            }
            if existing.bike_id == rental.bike_id {
                return Err(RentalError::BikeNotAvailable {
                    bike_id: rental.bike_id,
                });
            }
        }

        tables.next_rental_id += 1;
        let now = Utc::now();
        let created = Rental {
            id: RentalId::new(tables.next_rental_id),
            user_id: rental.user_id,
            bike_id: rental.bike_id,
            status: RentalStatus::Running,
            start_time: rental.start_time,
            start_latitude: rental.start.latitude,
            start_longitude: rental.start.longitude,
            end_time: None,
            end_latitude: None,
            end_longitude: None,
            duration_minutes: None,
            cost: None,
            created_at: now,
            updated_at: now,
        };
        tables.rentals.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_rental(&self, id: RentalId) -> Result<Option<Rental>> {
        Ok(self.tables.read().await.rentals.get(&id).cloned())
    }

    async fn get_running_rental_by_user(&self, user_id: UserId) -> Result<Option<Rental>> {
        let tables = self.tables.read().await;
        Ok(tables
            .rentals
            .values()
            .find(|r| r.user_id == user_id && r.is_running())
            .cloned())
    }

    async fn get_running_rental_by_bike(&self, bike_id: BikeId) -> Result<Option<Rental>> {
        let tables = self.tables.read().await;
        Ok(tables
            .rentals
            .values()
            .find(|r| r.bike_id == bike_id && r.is_running())
            .cloned())
    }

    async fn end_rental_record(
        &self,
        id: RentalId,
        completion: &RentalCompletion,
    ) -> Result<Rental> {
        let mut tables = self.tables.write().await;
        let rental = tables
            .rentals
            .get_mut(&id)
            .ok_or(RentalError::RentalNotFound { id })?;

        if !rental.status.can_transition_to(RentalStatus::Ended) {
            return Err(RentalError::InvalidStateTransition {
                from: rental.status,
                to: RentalStatus::Ended,
            });
        }

        rental.status = RentalStatus::Ended;
        rental.end_time = Some(completion.end_time);
        rental.end_latitude = Some(completion.end.latitude);
        rental.end_longitude = Some(completion.end.longitude);
        rental.duration_minutes = Some(completion.duration_minutes);
        rental.cost = Some(completion.cost);
        rental.updated_at = Utc::now();
        Ok(rental.clone())
    }

    async fn list_rentals_by_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Vec<Rental>> {
        let tables = self.tables.read().await;
        let sorted = newest_first(tables.rentals.values().filter(|r| r.user_id == user_id));
        Ok(paginate(sorted.into_iter().cloned(), page))
    }

    async fn count_rentals_by_user(&self, user_id: UserId) -> Result<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .rentals
            .values()
            .filter(|r| r.user_id == user_id)
            .count() as u64)
    }

    async fn list_rentals(&self, page: PageRequest) -> Result<Vec<Rental>> {
        let tables = self.tables.read().await;
        let sorted = newest_first(tables.rentals.values());
        Ok(paginate(sorted.into_iter().cloned(), page))
    }

    async fn count_rentals(&self) -> Result<u64> {
        Ok(self.tables.read().await.rentals.len() as u64)
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&user.email, None) {
            return Err(RentalError::EmailAlreadyExists {
                email: user.email.clone(),
            });
        }

        tables.next_user_id += 1;
        let now = Utc::now();
        let created = User {
            id: UserId::new(tables.next_user_id),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: UserId, update: &UserUpdate) -> Result<Option<User>> {
        let mut tables = self.tables.write().await;
        if let Some(email) = &update.email {
            if tables.email_taken(email, Some(id)) {
                return Err(RentalError::EmailAlreadyExists {
                    email: email.clone(),
                });
            }
        }

        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(email) = &update.email {
            user.email = email.clone();
        }
        if let Some(hash) = &update.password_hash {
            user.password_hash = hash.clone();
        }
        if let Some(first_name) = &update.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &update.last_name {
            user.last_name = last_name.clone();
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn list_users(&self, page: PageRequest) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(paginate(tables.users.values().cloned(), page))
    }

    async fn count_users(&self) -> Result<u64> {
        Ok(self.tables.read().await.users.len() as u64)
    }
}

#[async_trait]
impl HealthCheck for InMemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
