//! Shared-bike rental service
//!
//! The rental lifecycle engine lives in [`domain`]: it decides whether a
//! rental may start, applies the return geofence and fare on completion, and
//! keeps each bike's availability flag in step with its running rental.
//! [`storage`] provides SQLite and in-memory repositories, and [`api`] exposes
//! the engine over HTTP.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;
pub mod storage;

pub use config::VeloConfig;
pub use error::{RentalError, Result};
pub use server::{build_router, AppState, Repositories, Server};
