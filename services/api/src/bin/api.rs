//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, LogMailer, SmtpMailer},
    config::{Config, Storage},
    error::ApiError,
    web::{router, state::AppState},
};
use codoc_core::memory::InMemoryDatabase;
use codoc_core::ports::{DatabaseService, NotificationService};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
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

    // --- 2. Set Up Storage & Run Migrations ---
    let db: Arc<dyn DatabaseService> = match &config.storage {
        Storage::Postgres {
            database_url,
            max_connections,
        } => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(*max_connections)
                .connect_lazy(database_url)?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        Storage::Memory => {
            warn!("STORAGE=memory: all data is lost when the process exits");
            Arc::new(InMemoryDatabase::new())
        }
    };

    // --- 3. Set Up Outgoing Mail ---
    let notifier: Arc<dyn NotificationService> = match &config.smtp {
        Some(smtp) => {
            info!("Sending mail through {}:{}", smtp.host, smtp.port);
            Arc::new(SmtpMailer::new(smtp)?)
        }
        None => {
            info!("SMTP_HOST not set, notifications will only be logged");
            Arc::new(LogMailer)
        }
    };

    // --- 4. Build the Shared AppState & Router ---
    let app_state = Arc::new(AppState::new(db, notifier, config.clone()));
    let app = router(app_state)?;

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
