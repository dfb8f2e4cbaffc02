//! Database error types
//!
//! This module defines the error types that can occur during database
//! operations, including the classification the ledger's retry loop
//! depends on: lock contention and serialization failures are transient,
//! everything else is not.

use domain_billing::BillingError;
use thiserror::Error;

/// Errors that can occur during database operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Entity not found in database
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Lock contention or serialization failure on a single attempt
    #[error("Transient conflict: {0}")]
    TransientConflict(String),

    /// Lock contention persisted through every retry
    #[error("Conflicting updates on the same invoice after {attempts} attempts")]
    RetryExhausted { attempts: u32 },

    /// The transaction exceeded its deadline and was rolled back
    #[error("Transaction deadline of {deadline_ms}ms exceeded")]
    DeadlineExceeded { deadline_ms: u64 },

    /// Stored data could not be mapped back to domain types
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// Pool exhaustion - no available connections
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Generic SQL error
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Creates a not found error for a specific entity type and identifier
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound(format!("{} with id '{}' not found", entity, id))
    }

    /// Checks if this error indicates a record was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
    }

    /// Checks whether a retry of the whole transaction may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DatabaseError::TransientConflict(_) | DatabaseError::PoolExhausted
        )
    }
}

/// Classifies SQLx errors, mapping PostgreSQL error codes onto the
/// variants the retry loop cares about
///
/// https://www.postgresql.org/docs/current/errcodes-appendix.html
pub fn classify(error: sqlx::Error) -> DatabaseError {
    match &error {
        sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
        sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                match code.as_ref() {
                    // serialization_failure, deadlock_detected, lock_not_available
                    "40001" | "40P01" | "55P03" => {
                        DatabaseError::TransientConflict(db_err.message().to_string())
                    }
                    "23505" => DatabaseError::DuplicateEntry(db_err.message().to_string()),
                    "23503" => DatabaseError::ForeignKeyViolation(db_err.message().to_string()),
                    "23514" => DatabaseError::ConstraintViolation(db_err.message().to_string()),
                    _ => DatabaseError::QueryFailed(db_err.message().to_string()),
                }
            } else {
                DatabaseError::QueryFailed(db_err.message().to_string())
            }
        }
        _ => DatabaseError::SqlError(error),
    }
}

/// Errors surfaced by ledger repository operations
///
/// Precondition failures carry the domain error taxonomy; everything
/// infrastructural stays a `DatabaseError`.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Billing(#[from] BillingError),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(error: sqlx::Error) -> Self {
        RepositoryError::Database(classify(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DatabaseError::TransientConflict("lock".into()).is_transient());
        assert!(DatabaseError::PoolExhausted.is_transient());
        assert!(!DatabaseError::NotFound("x".into()).is_transient());
        assert!(!DatabaseError::RetryExhausted { attempts: 3 }.is_transient());
    }

    #[test]
    fn test_not_found_helper() {
        let error = DatabaseError::not_found("Invoice", "INV2025000001");
        assert!(error.is_not_found());
        assert!(error.to_string().contains("INV2025000001"));
    }
}
