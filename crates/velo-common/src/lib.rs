//! Shared building blocks for Velo binaries: layered configuration loading
//! and tracing initialisation.

pub mod config;
pub mod logging;

pub use config::{ConfigLoader, ConfigurationError};
