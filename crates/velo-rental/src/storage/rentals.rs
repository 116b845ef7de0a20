use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;

use crate::domain::types::{
    BikeId, NewRental, PageRequest, Rental, RentalCompletion, RentalId, RentalStatus, UserId,
};
use crate::error::{RentalError, Result};
use crate::storage::Database;

#[async_trait]
pub trait RentalRepository: Send + Sync {
    async fn has_running_rental(&self, user_id: UserId) -> Result<bool>;
    async fn create_rental(&self, rental: &NewRental) -> Result<Rental>;
    async fn get_rental(&self, id: RentalId) -> Result<Option<Rental>>;
    async fn get_running_rental_by_user(&self, user_id: UserId) -> Result<Option<Rental>>;
    async fn get_running_rental_by_bike(&self, bike_id: BikeId) -> Result<Option<Rental>>;
    /// Close a running rental. Fails with `InvalidStateTransition` if it
    /// has already ended and `RentalNotFound` if it does not exist.
    async fn end_rental_record(
        &self,
        id: RentalId,
        completion: &RentalCompletion,
    ) -> Result<Rental>;
    /// Newest first.
    async fn list_rentals_by_user(&self, user_id: UserId, page: PageRequest)
        -> Result<Vec<Rental>>;
    async fn count_rentals_by_user(&self, user_id: UserId) -> Result<u64>;
    /// Newest first.
    async fn list_rentals(&self, page: PageRequest) -> Result<Vec<Rental>>;
    async fn count_rentals(&self) -> Result<u64>;
}

pub struct SqlRentalRepository {
    db: Database,
}

const RENTAL_COLUMNS: &str = "id, user_id, bike_id, status, start_time, start_latitude, \
     start_longitude, end_time, end_latitude, end_longitude, duration_minutes, cost, \
     created_at, updated_at";

impl SqlRentalRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn rental_from_row(row: &SqliteRow) -> Result<Rental> {
        let status: String = row.try_get("status")?;
        let status = RentalStatus::from_str(&status)
            .map_err(|e| RentalError::database("decode_rental_status", e.to_string()))?;
        let cost = row
            .try_get::<Option<String>, _>("cost")?
            .map(|c| Decimal::from_str(&c))
            .transpose()
            .map_err(|e| RentalError::database("decode_rental_cost", e))?;

        Ok(Rental {
            id: RentalId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            bike_id: BikeId::new(row.try_get("bike_id")?),
            status,
            start_time: row.try_get::<DateTime<Utc>, _>("start_time")?,
            start_latitude: row.try_get("start_latitude")?,
            start_longitude: row.try_get("start_longitude")?,
            end_time: row.try_get::<Option<DateTime<Utc>>, _>("end_time")?,
            end_latitude: row.try_get("end_latitude")?,
            end_longitude: row.try_get("end_longitude")?,
            duration_minutes: row.try_get("duration_minutes")?,
            cost,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }

    /// Translate the running-rental unique indexes into domain errors.
    fn map_insert_error(rental: &NewRental, err: sqlx::Error) -> RentalError {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let message = db_err.message();
                if message.contains("rentals.user_id") {
                    return RentalError::UserHasActiveRental {
                        user_id: rental.user_id,
                    };
                }
                if message.contains("rentals.bike_id") {
                    return RentalError::BikeNotAvailable {
                        bike_id: rental.bike_id,
                    };
                }
            }
        }
        RentalError::database("create_rental", err)
    }

    async fn fetch_one_by(&self, sql: &str, operation: &str, key: i64) -> Result<Option<Rental>> {
        let row = sqlx::query(sql)
            .bind(key)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| RentalError::database(operation, e))?;

        row.as_ref().map(Self::rental_from_row).transpose()
    }
}

#[async_trait]
impl RentalRepository for SqlRentalRepository {
    async fn has_running_rental(&self, user_id: UserId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM rentals WHERE user_id = ? AND status = 'running')",
        )
        .bind(user_id.as_i64())
        .fetch_one(self.db.pool())
        .await
        .map_err(|e| RentalError::database("has_running_rental", e))?;

        Ok(exists)
    }

    async fn create_rental(&self, rental: &NewRental) -> Result<Rental> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO rentals
            (user_id, bike_id, status, start_time, start_latitude, start_longitude,
             created_at, updated_at)
            VALUES (?, ?, 'running', ?, ?, ?, ?, ?)
            "#,
        )
        .bind(rental.user_id.as_i64())
        .bind(rental.bike_id.as_i64())
        .bind(rental.start_time)
        .bind(rental.start.latitude)
        .bind(rental.start.longitude)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await
        .map_err(|e| Self::map_insert_error(rental, e))?;

        let id = RentalId::new(result.last_insert_rowid());
        self.get_rental(id)
            .await?
            .ok_or_else(|| RentalError::InconsistentState {
                message: format!("rental {id} vanished after insert"),
            })
    }

    async fn get_rental(&self, id: RentalId) -> Result<Option<Rental>> {
        self.fetch_one_by(
            &format!("SELECT {RENTAL_COLUMNS} FROM rentals WHERE id = ?"),
            "get_rental",
            id.as_i64(),
        )
        .await
    }

    async fn get_running_rental_by_user(&self, user_id: UserId) -> Result<Option<Rental>> {
        self.fetch_one_by(
            &format!(
                "SELECT {RENTAL_COLUMNS} FROM rentals WHERE user_id = ? AND status = 'running'"
            ),
            "get_running_rental_by_user",
            user_id.as_i64(),
        )
        .await
    }

    async fn get_running_rental_by_bike(&self, bike_id: BikeId) -> Result<Option<Rental>> {
        self.fetch_one_by(
            &format!(
                "SELECT {RENTAL_COLUMNS} FROM rentals WHERE bike_id = ? AND status = 'running'"
            ),
            "get_running_rental_by_bike",
            bike_id.as_i64(),
        )
        .await
    }

    async fn end_rental_record(
        &self,
        id: RentalId,
        completion: &RentalCompletion,
    ) -> Result<Rental> {
        let result = sqlx::query(
            r#"
            UPDATE rentals
            SET status = 'ended', end_time = ?, end_latitude = ?, end_longitude = ?,
                duration_minutes = ?, cost = ?, updated_at = ?
            WHERE id = ? AND status = 'running'
            "#,
        )
        .bind(completion.end_time)
        .bind(completion.end.latitude)
        .bind(completion.end.longitude)
        .bind(completion.duration_minutes)
        .bind(completion.cost.to_string())
        .bind(Utc::now())
        .bind(id.as_i64())
        .execute(self.db.pool())
        .await
        .map_err(|e| RentalError::database("end_rental_record", e))?;

        let rental = self
            .get_rental(id)
            .await?
            .ok_or(RentalError::RentalNotFound { id })?;

        if result.rows_affected() == 0 {
            return Err(RentalError::InvalidStateTransition {
                from: rental.status,
                to: RentalStatus::Ended,
            });
        }
        Ok(rental)
    }

    async fn list_rentals_by_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Vec<Rental>> {
        let rows = sqlx::query(&format!(
            "SELECT {RENTAL_COLUMNS} FROM rentals WHERE user_id = ? \
             ORDER BY start_time DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(user_id.as_i64())
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| RentalError::database("list_rentals_by_user", e))?;

        rows.iter().map(Self::rental_from_row).collect()
    }

    async fn count_rentals_by_user(&self, user_id: UserId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rentals WHERE user_id = ?")
            .bind(user_id.as_i64())
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| RentalError::database("count_rentals_by_user", e))?;
        Ok(count.max(0) as u64)
    }

    async fn list_rentals(&self, page: PageRequest) -> Result<Vec<Rental>> {
        let rows = sqlx::query(&format!(
            "SELECT {RENTAL_COLUMNS} FROM rentals ORDER BY start_time DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| RentalError::database("list_rentals", e))?;

        rows.iter().map(Self::rental_from_row).collect()
    }

    async fn count_rentals(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rentals")
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| RentalError::database("count_rentals", e))?;
        Ok(count.max(0) as u64)
    }
}
