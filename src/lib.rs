pub mod api;
pub mod config;
pub mod entities;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

pub use api::create_api_router;
pub use config::AppConfig;
pub use state::AppState;

/// Connects, creates missing tables and seeds the reference roles.
pub async fn init_database(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options.sqlx_logging(false);
    if database_url.contains(":memory:") {
        // Every pooled connection would otherwise open its own empty database.
        options.max_connections(1).min_connections(1);
    }

    let db = Database::connect(options).await?;
    entities::setup_schema(&db).await?;
    entities::seed_roles(&db).await?;
    Ok(db)
}
