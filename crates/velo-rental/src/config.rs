//! Configuration for the rental service

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use velo_common::config::{ConfigLoader, ConfigurationError};

use crate::domain::geofence::DEFAULT_GEOFENCE_RADIUS_KM;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VeloConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub rental: RentalConfig,
    pub pagination: PaginationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    /// Upper bound on a single request, in seconds
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite URL, e.g. `sqlite://velo.db` or `sqlite::memory:`
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://velo.db".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5000,
        }
    }
}

impl DatabaseConfig {
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Credentials for rider tokens and the admin surface.
///
/// The secret and admin credentials are empty by default and must be
/// supplied before the server will start.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub admin_username: String,
    pub admin_password: String,
    /// Lifetime of tokens issued at login
    pub token_ttl_hours: u64,
    /// Argon2 memory cost for stored passwords, in KiB
    pub password_memory_kib: u32,
    pub password_iterations: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            admin_username: String::new(),
            admin_password: String::new(),
            token_ttl_hours: 30 * 24,
            password_memory_kib: argon2::Params::DEFAULT_M_COST,
            password_iterations: argon2::Params::DEFAULT_T_COST,
        }
    }
}

impl AuthConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_hours.saturating_mul(3600))
    }

    /// Argon2id parameters for password hashing.
    pub fn password_params(&self) -> Result<argon2::Params, argon2::Error> {
        argon2::Params::new(
            self.password_memory_kib,
            self.password_iterations,
            argon2::Params::DEFAULT_P_COST,
            None,
        )
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"<redacted>")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("password_memory_kib", &self.password_memory_kib)
            .field("password_iterations", &self.password_iterations)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RentalConfig {
    pub geofence_radius_km: f64,
}

impl Default for RentalConfig {
    fn default() -> Self {
        Self {
            geofence_radius_km: DEFAULT_GEOFENCE_RADIUS_KM,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

impl VeloConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

impl ConfigLoader for VeloConfig {
    const ENV_PREFIX: &'static str = "VELO_";
    const DEFAULT_FILE: &'static str = "velo.toml";

    fn validate(&self) -> Result<(), ConfigurationError> {
        let required = [
            ("auth.jwt_secret", &self.auth.jwt_secret),
            ("auth.admin_username", &self.auth.admin_username),
            ("auth.admin_password", &self.auth.admin_password),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigurationError::MissingValue {
                    key: key.to_string(),
                });
            }
        }

        if self.auth.token_ttl_hours == 0 {
            return Err(ConfigurationError::InvalidValue {
                key: "auth.token_ttl_hours".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if let Err(e) = self.auth.password_params() {
            return Err(ConfigurationError::InvalidValue {
                key: "auth.password_memory_kib".to_string(),
                reason: format!("invalid argon2 parameters: {e}"),
            });
        }

        if self.database.url.trim().is_empty() {
            return Err(ConfigurationError::MissingValue {
                key: "database.url".to_string(),
            });
        }

        if self.database.max_connections == 0 {
            return Err(ConfigurationError::InvalidValue {
                key: "database.max_connections".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if !(self.rental.geofence_radius_km.is_finite() && self.rental.geofence_radius_km > 0.0) {
            return Err(ConfigurationError::InvalidValue {
                key: "rental.geofence_radius_km".to_string(),
                reason: "must be a positive number of kilometres".to_string(),
            });
        }

        if self.server.request_timeout_secs == 0 {
            return Err(ConfigurationError::InvalidValue {
                key: "server.request_timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let pagination = &self.pagination;
        if pagination.default_limit == 0 || pagination.max_limit == 0 {
            return Err(ConfigurationError::InvalidValue {
                key: "pagination".to_string(),
                reason: "limits must be at least 1".to_string(),
            });
        }
        if pagination.default_limit > pagination.max_limit {
            return Err(ConfigurationError::InvalidValue {
                key: "pagination.default_limit".to_string(),
                reason: format!(
                    "{} exceeds pagination.max_limit ({})",
                    pagination.default_limit, pagination.max_limit
                ),
            });
        }

        Ok(())
    }
}
