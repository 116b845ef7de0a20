use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;

use crate::domain::types::{Bike, BikeId, BikeUpdate, NewBike, PageRequest};
use crate::error::{RentalError, Result};
use crate::storage::Database;

#[async_trait]
pub trait BikeRepository: Send + Sync {
    async fn get_bike(&self, id: BikeId) -> Result<Option<Bike>>;
    async fn create_bike(&self, bike: &NewBike) -> Result<Bike>;
    /// Apply a partial edit. `None` when the bike does not exist.
    async fn update_bike(&self, id: BikeId, update: &BikeUpdate) -> Result<Option<Bike>>;
    /// Fails with `BikeNotFound` when no row matches.
    async fn set_bike_availability(&self, id: BikeId, available: bool) -> Result<()>;
    async fn list_available_bikes(&self, page: PageRequest) -> Result<Vec<Bike>>;
    async fn count_available_bikes(&self) -> Result<u64>;
    async fn list_bikes(&self, page: PageRequest) -> Result<Vec<Bike>>;
    async fn count_bikes(&self) -> Result<u64>;
}

pub struct SqlBikeRepository {
    db: Database,
}

impl SqlBikeRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn bike_from_row(row: &SqliteRow) -> Result<Bike> {
        let price: String = row.try_get("price_per_minute")?;
        let price_per_minute = Decimal::from_str(&price)
            .map_err(|e| RentalError::database("decode_bike_price", e))?;

        Ok(Bike {
            id: BikeId::new(row.try_get("id")?),
            is_available: row.try_get("is_available")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            price_per_minute,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }
}

const BIKE_COLUMNS: &str =
    "id, is_available, latitude, longitude, price_per_minute, created_at, updated_at";

#[async_trait]
impl BikeRepository for SqlBikeRepository {
    async fn get_bike(&self, id: BikeId) -> Result<Option<Bike>> {
        let row = sqlx::query(&format!("SELECT {BIKE_COLUMNS} FROM bikes WHERE id = ?"))
            .bind(id.as_i64())
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| RentalError::database("get_bike", e))?;

        row.as_ref().map(Self::bike_from_row).transpose()
    }

    async fn create_bike(&self, bike: &NewBike) -> Result<Bike> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO bikes (is_available, latitude, longitude, price_per_minute, created_at, updated_at)
            VALUES (1, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(bike.location.latitude)
        .bind(bike.location.longitude)
        .bind(bike.price_per_minute.to_string())
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await
        .map_err(|e| RentalError::database("create_bike", e))?;

        let id = BikeId::new(result.last_insert_rowid());
        self.get_bike(id)
            .await?
            .ok_or_else(|| RentalError::InconsistentState {
                message: format!("bike {id} vanished after insert"),
            })
    }

    async fn update_bike(&self, id: BikeId, update: &BikeUpdate) -> Result<Option<Bike>> {
        let result = sqlx::query(
            r#"
            UPDATE bikes
            SET latitude = COALESCE(?, latitude),
                longitude = COALESCE(?, longitude),
                price_per_minute = COALESCE(?, price_per_minute),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.latitude)
        .bind(update.longitude)
        .bind(update.price_per_minute.map(|p| p.to_string()))
        .bind(Utc::now())
        .bind(id.as_i64())
        .execute(self.db.pool())
        .await
        .map_err(|e| RentalError::database("update_bike", e))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_bike(id).await
    }

    async fn set_bike_availability(&self, id: BikeId, available: bool) -> Result<()> {
        let result = sqlx::query("UPDATE bikes SET is_available = ?, updated_at = ? WHERE id = ?")
            .bind(available)
            .bind(Utc::now())
            .bind(id.as_i64())
            .execute(self.db.pool())
            .await
            .map_err(|e| RentalError::database("set_bike_availability", e))?;

        if result.rows_affected() == 0 {
            return Err(RentalError::BikeNotFound { bike_id: id });
        }
        Ok(())
    }

    async fn list_available_bikes(&self, page: PageRequest) -> Result<Vec<Bike>> {
        let rows = sqlx::query(&format!(
            "SELECT {BIKE_COLUMNS} FROM bikes WHERE is_available = 1 ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| RentalError::database("list_available_bikes", e))?;

        rows.iter().map(Self::bike_from_row).collect()
    }

    async fn count_available_bikes(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bikes WHERE is_available = 1")
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| RentalError::database("count_available_bikes", e))?;
        Ok(count.max(0) as u64)
    }

    async fn list_bikes(&self, page: PageRequest) -> Result<Vec<Bike>> {
        let rows = sqlx::query(&format!(
            "SELECT {BIKE_COLUMNS} FROM bikes ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| RentalError::database("list_bikes", e))?;

        rows.iter().map(Self::bike_from_row).collect()
    }

    async fn count_bikes(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bikes")
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| RentalError::database("count_bikes", e))?;
        Ok(count.max(0) as u64)
    }
}
