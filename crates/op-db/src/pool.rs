//! Database connection pool management
//!
//! Provides PostgreSQL connection pooling using SQLx.

use std::time::Duration;

use op_core::config::DatabaseConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Idle connections are dropped after ten minutes
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);
const MAX_LIFETIME: Duration = Duration::from_secs(1800);

/// Database connection pool
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = pool_options(config).connect(&config.url).await?;

        tracing::info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database is reachable
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the connection pool
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
        }
    }
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections.min(config.max_connections))
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
}

/// Pool statistics
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_options_follow_config() {
        let config = DatabaseConfig {
            max_connections: 4,
            min_connections: 8,
            connect_timeout_seconds: 5,
            ..Default::default()
        };
        let options = pool_options(&config);
        assert_eq!(options.get_max_connections(), 4);
        assert_eq!(options.get_min_connections(), 4);
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(5));
    }
}
