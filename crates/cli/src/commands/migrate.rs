//! Database migration command.
//!
//! Migrations live in `crates/commerce/migrations/` and are embedded at
//! compile time, so the binary carries everything it needs.

use tracing::info;

use clementine_commerce::config::{CommerceConfig, ConfigError};
use clementine_commerce::db;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if configuration is missing, the database is
/// unreachable, or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let config = CommerceConfig::from_env()?;

    info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;

    info!("Running migrations...");
    sqlx::migrate!("../commerce/migrations").run(&pool).await?;

    info!("Migrations complete!");
    Ok(())
}
