//! Payment DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use infra_db::repositories::PaymentRow;

#[derive(Debug, Deserialize, Validate)]
pub struct PostPaymentRequest {
    pub amount: Decimal,
    /// cash | bank_transfer | card | mobile_money | cheque
    pub method: String,
    #[validate(length(min = 1, message = "an idempotency key is required"))]
    pub idempotency_key: String,
    pub received_by: Uuid,
    /// Permits posting beyond the outstanding balance; defaults to false
    #[serde(default)]
    pub allow_overpayment: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VoidPaymentRequest {
    #[validate(length(min = 1, message = "a void reason is required"))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefundPaymentRequest {
    pub amount: Decimal,
    #[validate(length(min = 1, message = "a refund reason is required"))]
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub method: String,
    pub status: String,
    pub idempotency_key: String,
    pub received_by: Uuid,
    pub refunded_total: Decimal,
    pub posted_at: DateTime<Utc>,
    pub reversed_at: Option<DateTime<Utc>>,
}

impl From<PaymentRow> for PaymentResponse {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: row.payment_id,
            invoice_id: row.invoice_id,
            amount: row.amount,
            currency: row.currency.trim().to_string(),
            method: row.method,
            status: row.status,
            idempotency_key: row.idempotency_key,
            received_by: row.received_by,
            refunded_total: row.refunded_total,
            posted_at: row.posted_at,
            reversed_at: row.reversed_at,
        }
    }
}
