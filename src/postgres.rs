use crate::error::MigrateError;
use log::LevelFilter;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, Pool, Postgres};
use std::str::FromStr;
use std::time::Duration;

/// Opens a connection pool for one side of a job from its configured
/// database URL. Each job owns its pools exclusively and closes them when its
/// tables are done.
pub async fn create_pool(url: &str) -> Result<Pool<Postgres>, MigrateError> {
    let options = PgConnectOptions::from_str(url)
        .map_err(|e| MigrateError::InvalidConfiguration(format!("invalid database url: {}", e)))?
        .log_statements(LevelFilter::Debug);

    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .connect_with(options)
        .await
        .map_err(|e| {
            let message = e.to_string();
            if message.contains("connection refused") {
                return MigrateError::Connection(format!(
                    "connection refused; check that PostgreSQL is reachable at the configured url: {}",
                    message
                ));
            }
            MigrateError::Connection(format!("failed to create pool: {}", message))
        })
}
