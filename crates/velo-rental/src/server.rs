//! HTTP server wiring

use anyhow::Context;
use axum::{routing::get, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::api::{self, auth::JwtKeys, routes::health};
use crate::config::VeloConfig;
use crate::domain::{
    AvailabilityCoordinator, Clock, FleetManager, Geofence, LifecycleLocks, PasswordHashing,
    RentalLifecycleManager, RentalOperations, SystemClock, UserManager,
};
use crate::storage::{
    BikeRepository, Database, HealthCheck, InMemoryStore, RentalRepository, SqlBikeRepository,
    SqlRentalRepository, SqlUserRepository, UserRepository,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<VeloConfig>,
    pub rentals: Arc<dyn RentalOperations>,
    pub fleet: Arc<FleetManager>,
    pub users: Arc<UserManager>,
    pub health: Arc<dyn HealthCheck>,
    pub jwt: Arc<JwtKeys>,
}

/// Storage backing one `AppState`
pub struct Repositories {
    pub bikes: Arc<dyn BikeRepository>,
    pub rentals: Arc<dyn RentalRepository>,
    pub users: Arc<dyn UserRepository>,
    pub health: Arc<dyn HealthCheck>,
}

impl Repositories {
    pub fn in_memory(store: InMemoryStore) -> Self {
        Self {
            bikes: Arc::new(store.clone()),
            rentals: Arc::new(store.clone()),
            users: Arc::new(store.clone()),
            health: Arc::new(store),
        }
    }

    pub fn sql(database: Database) -> Self {
        Self {
            bikes: Arc::new(SqlBikeRepository::new(database.clone())),
            rentals: Arc::new(SqlRentalRepository::new(database.clone())),
            users: Arc::new(SqlUserRepository::new(database.clone())),
            health: Arc::new(database),
        }
    }
}

impl AppState {
    /// Wire the domain services over the given repositories.
    pub fn new(config: VeloConfig, repositories: Repositories, clock: Arc<dyn Clock>) -> Self {
        let Repositories {
            bikes,
            rentals,
            users,
            health,
        } = repositories;
        let locks = Arc::new(LifecycleLocks::new());
        let availability = Arc::new(AvailabilityCoordinator::new(bikes.clone(), rentals.clone()));
        let geofence = Geofence::new(config.rental.geofence_radius_km);

        let lifecycle = RentalLifecycleManager::new(
            bikes.clone(),
            rentals.clone(),
            availability.clone(),
            locks.clone(),
            clock,
            geofence,
        );
        let fleet = FleetManager::new(bikes, rentals, availability, locks);

        // Parameters were checked when the configuration was validated.
        let params = config.auth.password_params().unwrap_or_default();
        let users = UserManager::new(users, PasswordHashing::new(params));
        let jwt = JwtKeys::new(&config.auth.jwt_secret, config.auth.token_ttl());

        Self {
            config: Arc::new(config),
            rentals: Arc::new(lifecycle),
            fleet: Arc::new(fleet),
            users: Arc::new(users),
            health,
            jwt: Arc::new(jwt),
        }
    }

    /// State backed by a fresh process-local store.
    pub fn in_memory(config: VeloConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(config, Repositories::in_memory(InMemoryStore::new()), clock)
    }
}

/// Full router: `/status` plus the versioned API, with the middleware stack.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(cors);

    Router::new()
        .route("/status", get(health::health_check))
        .nest("/api/v1", api::routes(state.clone()))
        .layer(middleware)
        .with_state(state)
}

pub struct Server {
    config: Arc<VeloConfig>,
    database: Database,
    app: Router,
}

impl Server {
    pub async fn new(config: VeloConfig) -> anyhow::Result<Self> {
        info!("Initializing rental server");

        let database = Database::connect(&config.database)
            .await
            .context("Failed to connect to database")?;

        let state = AppState::new(
            config,
            Repositories::sql(database.clone()),
            Arc::new(SystemClock),
        );
        let config = state.config.clone();
        let app = build_router(state);

        Ok(Self {
            config,
            database,
            app,
        })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        self.database
            .run_migrations()
            .await
            .context("Migration failed")
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.server.bind_address;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to address {addr}"))?;

        self.run_with_listener(listener, shutdown_signal()).await
    }

    pub async fn run_with_listener<F>(
        self,
        listener: tokio::net::TcpListener,
        shutdown: F,
    ) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!("Rental API listening on {}", addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("Server error")?;

        info!("Rental API stopped");
        Ok(())
    }
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            warn!("Received terminate signal, shutting down");
        },
    }
}
