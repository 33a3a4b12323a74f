//! services/api/src/bin/api.rs

use clinic_api::{
    adapters::{DbAdapter, MemoryDb},
    config::Config,
    error::ApiError,
    sweeper::spawn_session_sweeper,
    web::{build_router, state::AppState, validation::Validators},
};
use clinic_core::ports::{Clock, DatabaseService, SystemClock};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Pick the Storage Adapter ---
    let db: Arc<dyn DatabaseService> = match &config.database_url {
        Some(url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        None => {
            warn!("DATABASE_URL is not set; using the in-memory store. Data is lost on restart.");
            Arc::new(MemoryDb::new())
        }
    };

    // --- 3. Build the Shared AppState ---
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(config.clinic_offset));
    let validators = Validators::new()
        .map_err(|e| ApiError::Internal(format!("Failed to compile validators: {}", e)))?;
    let app_state = Arc::new(AppState::new(db.clone(), clock, config.clone(), validators));

    // --- 4. Start Background Tasks ---
    let shutdown = CancellationToken::new();
    let sweeper = spawn_session_sweeper(db, config.session_sweep_interval, shutdown.clone());

    // --- 5. Create the Web Router ---
    let app = build_router(app_state);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
            signal_token.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        error!("Session sweeper ended abnormally: {}", e);
    }
    info!("Server stopped");
    Ok(())
}
