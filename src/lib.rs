// Public modules
pub mod auth;
pub mod config;
pub mod domains;
pub mod errors;
pub mod types;
pub mod validation;

// Private modules
mod db_migration;

#[cfg(test)]
mod test_support;

use crate::config::AppConfig;
use crate::errors::{DbError, ServiceResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

pub use db_migration::run_migrations;

/// Initialise `env_logger` once. Later calls are no-ops.
///
/// `RUST_LOG` wins when set; otherwise debug builds log at `debug` and release builds at `info`.
pub fn init_logging() {
    let default_level = if cfg!(debug_assertions) { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).try_init();
}

// Entry point for initialization
/// Open the database named by the configuration and bring its schema up to date.
pub async fn initialize(config: &AppConfig) -> ServiceResult<SqlitePool> {
    init_logging();
    log::debug!("Connecting to {}", config.database_url);

    let options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(DbError::from)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(DbError::from)?;

    run_migrations(&pool).await?;
    log::info!("Database ready at {}", config.database_url);
    Ok(pool)
}
