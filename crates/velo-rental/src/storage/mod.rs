pub mod bikes;
pub mod database;
pub mod memory;
pub mod rentals;
pub mod users;

pub use bikes::{BikeRepository, SqlBikeRepository};
pub use database::Database;
pub use memory::InMemoryStore;
pub use rentals::{RentalRepository, SqlRentalRepository};
pub use users::{SqlUserRepository, UserRepository};

use async_trait::async_trait;

use crate::error::Result;

/// Liveness check against the backing store
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> Result<()>;
}
