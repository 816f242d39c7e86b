use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use mercado_backend::{create_api_router, init_database, AppConfig, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let db = match init_database(&config.database_url).await {
        Ok(db) => db,
        Err(err) => {
            tracing::error!(error = %err, "Failed to prepare the database");
            std::process::exit(1);
        }
    };

    let bind_address = config.bind_address.clone();
    let app = create_api_router(AppState::new(Arc::new(db), config));

    let listener = match tokio::net::TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(address = %bind_address, error = %err, "Failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(address = %bind_address, "Listening");
    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(error = %err, "Server stopped");
    }
}
