use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::domain::types::{NewUser, PageRequest, User, UserId, UserUpdate};
use crate::error::{RentalError, Result};
use crate::storage::Database;

/// Rider accounts. Email lookups and uniqueness ignore ASCII case.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    /// Fails with `EmailAlreadyExists` when the address is taken.
    async fn create_user(&self, user: &NewUser) -> Result<User>;
    /// Apply a partial edit. `None` when the user does not exist.
    async fn update_user(&self, id: UserId, update: &UserUpdate) -> Result<Option<User>>;
    async fn list_users(&self, page: PageRequest) -> Result<Vec<User>>;
    async fn count_users(&self) -> Result<u64>;
}

pub struct SqlUserRepository {
    db: Database,
}

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, created_at, updated_at";

impl SqlUserRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn user_from_row(row: &SqliteRow) -> Result<User> {
        Ok(User {
            id: UserId::new(row.try_get("id")?),
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }

    fn map_email_conflict(operation: &str, email: Option<&str>, err: sqlx::Error) -> RentalError {
        if let (sqlx::Error::Database(db_err), Some(email)) = (&err, email) {
            if db_err.is_unique_violation() {
                return RentalError::EmailAlreadyExists {
                    email: email.to_string(),
                };
            }
        }
        RentalError::database(operation, err)
    }
}

#[async_trait]
impl UserRepository for SqlUserRepository {
    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id.as_i64())
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| RentalError::database("get_user", e))?;

        row.as_ref().map(Self::user_from_row).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| RentalError::database("get_user_by_email", e))?;

        row.as_ref().map(Self::user_from_row).transpose()
    }

    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await
        .map_err(|e| Self::map_email_conflict("create_user", Some(user.email.as_str()), e))?;

        let id = UserId::new(result.last_insert_rowid());
        self.get_user(id)
            .await?
            .ok_or_else(|| RentalError::InconsistentState {
                message: format!("user {id} vanished after insert"),
            })
    }

    async fn update_user(&self, id: UserId, update: &UserUpdate) -> Result<Option<User>> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = COALESCE(?, email),
                password_hash = COALESCE(?, password_hash),
                first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.email.as_deref())
        .bind(update.password_hash.as_deref())
        .bind(update.first_name.as_deref())
        .bind(update.last_name.as_deref())
        .bind(Utc::now())
        .bind(id.as_i64())
        .execute(self.db.pool())
        .await
        .map_err(|e| Self::map_email_conflict("update_user", update.email.as_deref(), e))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_user(id).await
    }

    async fn list_users(&self, page: PageRequest) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| RentalError::database("list_users", e))?;

        rows.iter().map(Self::user_from_row).collect()
    }

    async fn count_users(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| RentalError::database("count_users", e))?;
        Ok(count.max(0) as u64)
    }
}
