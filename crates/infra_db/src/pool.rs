//! Database connection pool management
//!
//! Pool construction for PostgreSQL via SQLx. Besides the usual sizing
//! knobs, every connection gets a server-side `statement_timeout` so a
//! ledger transaction that loses its way is cut off by the database even
//! if the client-side deadline never fires.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

use crate::error::DatabaseError;

/// Type alias for the PostgreSQL connection pool
pub type DatabasePool = PgPool;

/// Connection pool settings
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use infra_db::DatabaseConfig;
///
/// let config = DatabaseConfig::new("postgres://localhost/school_fees")
///     .max_connections(20)
///     .acquire_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub url: String,
    /// Upper bound on pooled connections
    pub max_connections: u32,
    /// Connections kept warm when idle
    pub min_connections: u32,
    /// How long a caller waits for a free connection
    pub acquire_timeout: Duration,
    /// Connections are recycled after this lifetime
    pub max_lifetime: Duration,
    /// Idle connections are closed after this
    pub idle_timeout: Duration,
    /// Server-side statement timeout applied to every connection
    pub statement_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: Duration::from_secs(30 * 60),
            idle_timeout: Duration::from_secs(10 * 60),
            statement_timeout: Duration::from_secs(10),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the server-side statement timeout
    ///
    /// Should sit above the ledger's client-side transaction deadline, as
    /// a backstop rather than the primary cut-off.
    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new("postgres://localhost/school_fees")
    }
}

/// Builds the connection pool
///
/// # Errors
///
/// Returns `DatabaseError::ConnectionFailed` when the pool cannot reach
/// the database.
pub async fn create_pool(config: DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "creating database pool"
    );

    let statement_timeout_ms = config.statement_timeout.as_millis() as u64;
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::Executor::execute(
                    conn,
                    format!("SET statement_timeout = {statement_timeout_ms}").as_str(),
                )
                .await?;
                Ok(())
            })
        })
        .connect(&config.url)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

    info!("database pool ready");
    Ok(pool)
}

/// Builds a pool from a URL with default settings
pub async fn create_pool_from_url(url: &str) -> Result<DatabasePool, DatabaseError> {
    create_pool(DatabaseConfig::new(url)).await
}

/// Applies the bundled SQL migrations
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), DatabaseError> {
    info!("running database migrations");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
    info!("database ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = DatabaseConfig::new("postgres://test")
            .max_connections(50)
            .acquire_timeout(Duration::from_secs(60))
            .statement_timeout(Duration::from_secs(8));

        assert_eq!(config.max_connections, 50);
        assert_eq!(config.acquire_timeout, Duration::from_secs(60));
        assert_eq!(config.statement_timeout, Duration::from_secs(8));
    }

    #[test]
    fn test_defaults_keep_statement_timeout_above_ledger_deadline() {
        let config = DatabaseConfig::default();
        // The ledger's client-side deadline defaults to 5s
        assert!(config.statement_timeout >= Duration::from_secs(5));
    }
}
