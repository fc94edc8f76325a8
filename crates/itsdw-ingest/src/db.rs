//! Database connection
//!
//! A run uses exactly one PostgreSQL connection, held in a pool capped at a
//! single connection so every statement of the run goes through it in order.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;

/// Pool settings for a run: one connection, never recycled while idle or
/// because of its age
pub fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(1)
        .min_connections(0)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(None)
        .max_lifetime(None)
}

pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = pool_options(config).connect(config.url.expose()).await?;

    info!(
        connect_timeout_secs = config.connect_timeout_secs,
        "Database connection established"
    );

    Ok(pool)
}

/// Close the connection, waiting for in-flight statements
pub async fn close(pool: PgPool) {
    pool.close().await;
    info!("Database connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use itsdw_common::Secret;

    #[test]
    fn test_single_connection_is_never_recycled() {
        let config = DatabaseConfig {
            url: Secret::new("postgresql://localhost/itsdw"),
            connect_timeout_secs: 7,
        };
        let options = pool_options(&config);

        assert_eq!(options.get_max_connections(), 1);
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(7));
        assert_eq!(options.get_idle_timeout(), None);
        assert_eq!(options.get_max_lifetime(), None);
    }
}
