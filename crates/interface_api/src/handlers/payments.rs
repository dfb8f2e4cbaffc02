//! Payment handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::Money;
use domain_billing::{PaymentMethod, PostPayment};

use crate::dto::payments::*;
use crate::error::ApiError;
use crate::AppState;

fn parse_method(method: &str) -> Result<PaymentMethod, ApiError> {
    match method {
        "cash" => Ok(PaymentMethod::Cash),
        "bank_transfer" => Ok(PaymentMethod::BankTransfer),
        "card" => Ok(PaymentMethod::Card),
        "mobile_money" => Ok(PaymentMethod::MobileMoney),
        "cheque" => Ok(PaymentMethod::Cheque),
        other => Err(ApiError::Validation(format!(
            "unknown payment method '{other}'"
        ))),
    }
}

/// Posts a payment against an invoice
pub async fn post_payment(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<PostPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    request.validate()?;
    let currency = state.currency()?;
    let method = parse_method(&request.method)?;

    let mut cmd = PostPayment::new(
        Money::new(request.amount, currency),
        method,
        request.idempotency_key,
        request.received_by.into(),
    );
    if request.allow_overpayment {
        cmd = cmd.allow_overpayment();
    }

    let row = state.ledger().post_payment(invoice_id, &cmd).await?;
    Ok((StatusCode::CREATED, Json(row.into())))
}

/// Voids an applied payment
pub async fn void_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<VoidPaymentRequest>,
) -> Result<StatusCode, ApiError> {
    request.validate()?;
    state
        .ledger()
        .void_payment(payment_id, &request.reason)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Refunds part or all of an applied payment
pub async fn refund_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<RefundPaymentRequest>,
) -> Result<StatusCode, ApiError> {
    request.validate()?;
    let currency = state.currency()?;
    state
        .ledger()
        .refund_payment(payment_id, Money::new(request.amount, currency), &request.reason)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method() {
        assert!(parse_method("cash").is_ok());
        assert!(parse_method("mobile_money").is_ok());
        assert!(matches!(
            parse_method("crypto"),
            Err(ApiError::Validation(_))
        ));
    }
}
