//! Collections queries
//!
//! Read-only aggregation for the collections views: plain committed-read
//! `SELECT`s, no row locks, tolerant of reads that trail in-flight
//! transactions by a moment.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{classify, DatabaseError};
use crate::repositories::invoices::InvoiceRow;

/// One aging bucket aggregated in SQL
#[derive(Debug, Clone, FromRow)]
pub struct AgingBucketRow {
    pub bucket: String,
    pub invoice_count: i64,
    pub outstanding: Decimal,
}

/// A student's outstanding position
#[derive(Debug, Clone, FromRow)]
pub struct DebtorRow {
    pub student_id: Uuid,
    pub outstanding: Decimal,
    pub invoice_count: i64,
}

/// Read-side queries over the ledger tables
#[derive(Debug, Clone)]
pub struct CollectionsQueries {
    pool: PgPool,
}

impl CollectionsQueries {
    /// Creates the query set over the given pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Invoices still owing money past their due date, oldest first
    pub async fn overdue_invoices(
        &self,
        as_of: NaiveDate,
        limit: i64,
    ) -> Result<Vec<InvoiceRow>, DatabaseError> {
        sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT * FROM invoices
            WHERE status IN ('approved', 'partial')
              AND balance > 0
              AND due_date < $1
            ORDER BY due_date, invoice_number
            LIMIT $2
            "#,
        )
        .bind(as_of)
        .bind(if limit > 0 { limit } else { 100 })
        .fetch_all(&self.pool)
        .await
        .map_err(classify)
    }

    /// Outstanding receivables bucketed by days overdue
    /// (0-30 / 31-60 / 61-90 / 90+)
    pub async fn aging_buckets(
        &self,
        as_of: NaiveDate,
    ) -> Result<Vec<AgingBucketRow>, DatabaseError> {
        sqlx::query_as::<_, AgingBucketRow>(
            r#"
            SELECT bucket,
                   COUNT(*) AS invoice_count,
                   COALESCE(SUM(balance), 0) AS outstanding
            FROM (
                SELECT balance,
                       CASE
                           WHEN $1 - due_date <= 30 THEN '0-30'
                           WHEN $1 - due_date <= 60 THEN '31-60'
                           WHEN $1 - due_date <= 90 THEN '61-90'
                           ELSE '90+'
                       END AS bucket
                FROM invoices
                WHERE status IN ('approved', 'partial')
                  AND balance > 0
                  AND due_date < $1
            ) aged
            GROUP BY bucket
            ORDER BY MIN(CASE bucket
                         WHEN '0-30' THEN 1 WHEN '31-60' THEN 2
                         WHEN '61-90' THEN 3 ELSE 4 END)
            "#,
        )
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)
    }

    /// The students owing the most, largest first
    pub async fn top_debtors(&self, limit: i64) -> Result<Vec<DebtorRow>, DatabaseError> {
        sqlx::query_as::<_, DebtorRow>(
            r#"
            SELECT student_id,
                   SUM(balance) AS outstanding,
                   COUNT(*) AS invoice_count
            FROM invoices
            WHERE status IN ('approved', 'partial')
              AND balance > 0
            GROUP BY student_id
            ORDER BY outstanding DESC, student_id
            LIMIT $1
            "#,
        )
        .bind(if limit > 0 { limit } else { 10 })
        .fetch_all(&self.pool)
        .await
        .map_err(classify)
    }
}
