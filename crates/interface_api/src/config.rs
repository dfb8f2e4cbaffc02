//! API configuration

use serde::Deserialize;

/// API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database URL
    pub database_url: String,
    /// Log level
    pub log_level: String,
    /// Billing currency (ISO 4217 code)
    pub currency: String,
    /// Ledger retry attempts before surfacing a conflict
    pub ledger_max_retries: u32,
    /// Base backoff between ledger retries, in milliseconds
    pub ledger_backoff_ms: u64,
    /// Per-transaction deadline, in milliseconds
    pub transaction_deadline_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: "postgres://localhost/school_fees".to_string(),
            log_level: "info".to_string(),
            currency: "USD".to_string(),
            ledger_max_retries: 3,
            ledger_backoff_ms: 50,
            transaction_deadline_ms: 5000,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
