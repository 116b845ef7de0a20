use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{error, info};

use crate::config::DatabaseConfig;
use crate::error::{RentalError, Result};
use crate::storage::HealthCheck;

/// Shared SQLite connection pool
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| RentalError::database("parse_database_url", e))?
            .create_if_missing(true)
            .busy_timeout(config.busy_timeout())
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);

        if config.is_in_memory() {
            // Each connection to `:memory:` is its own database; pin to one.
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| RentalError::database("connect", e))?;

        info!(url = %config.url, "Connected to database");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        match sqlx::migrate!("./migrations").run(&self.pool).await {
            Ok(()) => {
                info!("Database migrations completed successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to run database migrations: {}", e);
                Err(RentalError::database("run_migrations", e))
            }
        }
    }

    /// Open an in-memory database with the schema applied.
    pub async fn in_memory() -> Result<Self> {
        let db = Self::connect(&DatabaseConfig::in_memory()).await?;
        db.run_migrations().await?;
        Ok(db)
    }
}

#[async_trait]
impl HealthCheck for Database {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| RentalError::database("ping", e))?;
        Ok(())
    }
}
