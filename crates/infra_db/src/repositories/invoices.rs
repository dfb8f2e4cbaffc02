//! Invoice repository
//!
//! Persists generated invoices: the header, its line items, and any
//! installment schedule land in one transaction or not at all. Invoice
//! numbers are allocated from a per-year counter row with
//! `UPDATE … RETURNING`, so concurrent generation cannot collide.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use core_kernel::AcademicYear;
use domain_billing::Invoice;

use crate::error::{classify, DatabaseError};

/// Stored invoice header
#[derive(Debug, Clone, FromRow)]
pub struct InvoiceRow {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub student_id: Uuid,
    pub class_id: Uuid,
    pub term_id: Uuid,
    pub academic_year: i32,
    pub currency: String,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance: Decimal,
    pub status: String,
    pub due_date: NaiveDate,
    pub plan_id: Option<Uuid>,
    pub approved_by: Option<Uuid>,
    pub approval_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

/// Stored invoice line
#[derive(Debug, Clone, FromRow)]
pub struct InvoiceItemRow {
    pub invoice_item_id: Uuid,
    pub invoice_id: Uuid,
    pub fee_item_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub optional: bool,
}

/// Stored schedule entry
#[derive(Debug, Clone, FromRow)]
pub struct ScheduleEntryRow {
    pub label: String,
    pub due_date: NaiveDate,
    pub amount: Decimal,
}

/// Filters for listing invoices
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub student_id: Option<Uuid>,
    pub status: Option<String>,
    pub academic_year: Option<i32>,
    pub limit: i64,
}

/// Repository for invoice persistence
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: PgPool,
}

impl InvoiceRepository {
    /// Creates a new repository over the given pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Allocates the next invoice number for an academic year
    ///
    /// A single `UPDATE … RETURNING` against the counter row serializes
    /// concurrent allocations; there is no read-then-increment window.
    pub async fn allocate_number(&self, year: AcademicYear) -> Result<String, DatabaseError> {
        let next: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO invoice_number_counters (academic_year, last_value)
            VALUES ($1, 1)
            ON CONFLICT (academic_year)
            DO UPDATE SET last_value = invoice_number_counters.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(year.start_year())
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        Ok(format!("INV{}{:06}", year.start_year(), next))
    }

    /// Inserts a generated invoice with its items and schedule atomically
    pub async fn create(&self, invoice: &Invoice) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                invoice_id, invoice_number, student_id, class_id, term_id,
                academic_year, currency, total_amount, paid_amount, balance,
                status, due_date, plan_id, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(*invoice.id.as_uuid())
        .bind(&invoice.invoice_number)
        .bind(*invoice.student_id.as_uuid())
        .bind(*invoice.class_id.as_uuid())
        .bind(*invoice.term_id.as_uuid())
        .bind(invoice.academic_year.start_year())
        .bind(invoice.currency.code())
        .bind(invoice.total_amount.amount())
        .bind(invoice.paid_amount.amount())
        .bind(invoice.balance.amount())
        .bind(invoice.status.as_str())
        .bind(invoice.due_date)
        .bind(invoice.schedule.as_ref().map(|s| *s.plan_id.as_uuid()))
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        for item in &invoice.items {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (
                    invoice_item_id, invoice_id, fee_item_id, description,
                    quantity, unit_price, amount, optional
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(*item.id.as_uuid())
            .bind(*invoice.id.as_uuid())
            .bind(*item.fee_item_id.as_uuid())
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price.amount())
            .bind(item.amount.amount())
            .bind(item.optional)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;
        }

        if let Some(schedule) = &invoice.schedule {
            for (position, entry) in schedule.entries.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO invoice_schedule_entries (
                        entry_id, invoice_id, position, label, due_date, amount
                    ) VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(*invoice.id.as_uuid())
                .bind(position as i32)
                .bind(&entry.label)
                .bind(entry.due_date)
                .bind(entry.amount.amount())
                .execute(&mut *tx)
                .await
                .map_err(classify)?;
            }
        }

        tx.commit().await.map_err(classify)?;
        info!(invoice = %invoice.invoice_number, "invoice persisted");
        Ok(())
    }

    /// Fetches an invoice header
    pub async fn get(&self, invoice_id: Uuid) -> Result<InvoiceRow, DatabaseError> {
        sqlx::query_as::<_, InvoiceRow>(
            r#"SELECT * FROM invoices WHERE invoice_id = $1"#,
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?
        .ok_or_else(|| DatabaseError::not_found("Invoice", invoice_id))
    }

    /// Fetches an invoice's line items
    pub async fn items(&self, invoice_id: Uuid) -> Result<Vec<InvoiceItemRow>, DatabaseError> {
        sqlx::query_as::<_, InvoiceItemRow>(
            r#"
            SELECT invoice_item_id, invoice_id, fee_item_id, description,
                   quantity, unit_price, amount, optional
            FROM invoice_items
            WHERE invoice_id = $1
            ORDER BY invoice_item_id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)
    }

    /// Fetches an invoice's installment schedule entries
    pub async fn schedule(
        &self,
        invoice_id: Uuid,
    ) -> Result<Vec<ScheduleEntryRow>, DatabaseError> {
        sqlx::query_as::<_, ScheduleEntryRow>(
            r#"
            SELECT label, due_date, amount
            FROM invoice_schedule_entries
            WHERE invoice_id = $1
            ORDER BY position
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)
    }

    /// Lists invoice headers matching the filter, newest first
    pub async fn list(&self, filter: &InvoiceFilter) -> Result<Vec<InvoiceRow>, DatabaseError> {
        let limit = if filter.limit > 0 { filter.limit } else { 50 };
        sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT * FROM invoices
            WHERE ($1::uuid IS NULL OR student_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::int IS NULL OR academic_year = $3)
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(filter.student_id)
        .bind(filter.status.as_deref())
        .bind(filter.academic_year)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)
    }
}
