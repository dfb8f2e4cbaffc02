//! API error handling
//!
//! Maps the domain and infrastructure error taxonomy onto HTTP statuses:
//! validation → 422, missing entities → 404, state and contention
//! conflicts → 409, invariant violations → 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use domain_billing::BillingError;
use domain_fees::FeesError;
use infra_db::{DatabaseError, RepositoryError};

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            ApiError::Validation(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg.clone())
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone())
            }
            ApiError::Database(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", msg.clone())
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Validation(msg) => ApiError::Validation(msg),
            BillingError::State(msg) => ApiError::Conflict(msg),
            BillingError::InvoiceNotFound(id) => ApiError::NotFound(format!("invoice {id}")),
            BillingError::PaymentNotFound(id) => ApiError::NotFound(format!("payment {id}")),
            BillingError::DuplicateInvoice(number) => {
                ApiError::Conflict(format!("invoice {number} already exists"))
            }
            BillingError::UnresolvedFeeItems { .. } => ApiError::Validation(err.to_string()),
            BillingError::InvariantViolation(msg) => ApiError::Internal(msg),
            BillingError::Money(e) => ApiError::Validation(e.to_string()),
            BillingError::Fees(e) => e.into(),
        }
    }
}

impl From<FeesError> for ApiError {
    fn from(err: FeesError) -> Self {
        match err {
            FeesError::RuleNotFound { .. } => ApiError::Validation(err.to_string()),
            FeesError::InvalidPlan { .. } => ApiError::Validation(err.to_string()),
            FeesError::Validation(msg) => ApiError::Validation(msg),
            FeesError::Money(e) => ApiError::Validation(e.to_string()),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::NotFound(msg),
            DatabaseError::RetryExhausted { .. } | DatabaseError::TransientConflict(_) => {
                ApiError::Conflict(err.to_string())
            }
            DatabaseError::DeadlineExceeded { .. } => ApiError::Conflict(err.to_string()),
            DatabaseError::DuplicateEntry(msg) => ApiError::Conflict(msg),
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(e) => e.into(),
            RepositoryError::Billing(e) => e.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_errors_map_to_conflict() {
        let api: ApiError = BillingError::state("invoice is paid").into();
        assert!(matches!(api, ApiError::Conflict(_)));
    }

    #[test]
    fn test_retry_exhausted_maps_to_conflict() {
        let api: ApiError = DatabaseError::RetryExhausted { attempts: 3 }.into();
        assert!(matches!(api, ApiError::Conflict(_)));
    }

    #[test]
    fn test_missing_invoice_maps_to_not_found() {
        let api: ApiError = BillingError::InvoiceNotFound("abc".into()).into();
        assert!(matches!(api, ApiError::NotFound(_)));
    }

    #[test]
    fn test_unresolved_items_map_to_validation() {
        let api: ApiError = BillingError::UnresolvedFeeItems {
            items: vec!["TUITION".into()],
        }
        .into();
        match api {
            ApiError::Validation(msg) => assert!(msg.contains("TUITION")),
            other => panic!("expected validation, got {other:?}"),
        }
    }
}
