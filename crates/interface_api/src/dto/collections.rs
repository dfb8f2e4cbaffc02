//! Collections DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use infra_db::repositories::{AgingBucketRow, DebtorRow};

#[derive(Debug, Deserialize)]
pub struct OverdueQuery {
    /// Defaults to today
    pub as_of: Option<NaiveDate>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AgingQuery {
    /// Defaults to today
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct DebtorsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AgingBucketResponse {
    pub bucket: String,
    pub invoice_count: i64,
    pub outstanding: Decimal,
}

impl From<AgingBucketRow> for AgingBucketResponse {
    fn from(row: AgingBucketRow) -> Self {
        Self {
            bucket: row.bucket,
            invoice_count: row.invoice_count,
            outstanding: row.outstanding,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AgingReportResponse {
    pub as_of: NaiveDate,
    pub buckets: Vec<AgingBucketResponse>,
}

#[derive(Debug, Serialize)]
pub struct DebtorResponse {
    pub student_id: Uuid,
    pub outstanding: Decimal,
    pub invoice_count: i64,
}

impl From<DebtorRow> for DebtorResponse {
    fn from(row: DebtorRow) -> Self {
        Self {
            student_id: row.student_id,
            outstanding: row.outstanding,
            invoice_count: row.invoice_count,
        }
    }
}
