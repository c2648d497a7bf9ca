//! Subcommand implementations.

pub mod code;
pub mod migrate;
pub mod sessions;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

/// Errors shared by the database-backed commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Session store failed.
    #[error("Session store error: {0}")]
    SessionStore(#[from] promo_bridge_server::session::SessionStoreError),

    /// Shop domain did not parse.
    #[error(transparent)]
    InvalidShop(#[from] promo_bridge_core::ShopDomainError),
}

/// Connect to `DATABASE_URL`.
pub async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(promo_bridge_server::db::create_pool(&database_url).await?)
}
