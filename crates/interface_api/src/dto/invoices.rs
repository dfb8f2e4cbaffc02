//! Invoice DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_billing::Invoice;
use infra_db::repositories::{InvoiceItemRow, InvoiceRow, ScheduleEntryRow};

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateInvoiceRequest {
    pub student_id: Uuid,
    pub class_id: Uuid,
    pub term_id: Uuid,
    pub academic_year: i32,
    #[validate(length(min = 1, message = "at least one fee item is required"))]
    pub fee_item_ids: Vec<Uuid>,
    pub installment_plan_id: Option<Uuid>,
    pub due_date: NaiveDate,
    /// Student level; looked up in the student directory when omitted
    pub level: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApproveInvoiceRequest {
    pub approver_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectInvoiceRequest {
    #[validate(length(min = 1, message = "a rejection reason is required"))]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ListInvoicesQuery {
    pub student_id: Option<Uuid>,
    pub status: Option<String>,
    pub academic_year: Option<i32>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceItemResponse {
    pub id: Uuid,
    pub fee_item_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub optional: bool,
}

#[derive(Debug, Serialize)]
pub struct ScheduleEntryResponse {
    pub label: String,
    pub due_date: NaiveDate,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
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
    pub items: Vec<InvoiceItemResponse>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub schedule: Vec<ScheduleEntryResponse>,
    pub created_at: DateTime<Utc>,
}

impl From<&Invoice> for InvoiceResponse {
    fn from(invoice: &Invoice) -> Self {
        Self {
            id: (*invoice.id.as_uuid()),
            invoice_number: invoice.invoice_number.clone(),
            student_id: *invoice.student_id.as_uuid(),
            class_id: *invoice.class_id.as_uuid(),
            term_id: *invoice.term_id.as_uuid(),
            academic_year: invoice.academic_year.start_year(),
            currency: invoice.currency.code().to_string(),
            total_amount: invoice.total_amount.amount(),
            paid_amount: invoice.paid_amount.amount(),
            balance: invoice.balance.amount(),
            status: invoice.status.as_str().to_string(),
            due_date: invoice.due_date,
            items: invoice
                .items
                .iter()
                .map(|item| InvoiceItemResponse {
                    id: *item.id.as_uuid(),
                    fee_item_id: *item.fee_item_id.as_uuid(),
                    description: item.description.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price.amount(),
                    amount: item.amount.amount(),
                    optional: item.optional,
                })
                .collect(),
            schedule: invoice
                .schedule
                .as_ref()
                .map(|schedule| {
                    schedule
                        .entries
                        .iter()
                        .map(|entry| ScheduleEntryResponse {
                            label: entry.label.clone(),
                            due_date: entry.due_date,
                            amount: entry.amount.amount(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            created_at: invoice.created_at,
        }
    }
}

impl InvoiceResponse {
    /// Builds a response from stored rows
    pub fn from_rows(
        header: InvoiceRow,
        items: Vec<InvoiceItemRow>,
        schedule: Vec<ScheduleEntryRow>,
    ) -> Self {
        Self {
            id: header.invoice_id,
            invoice_number: header.invoice_number,
            student_id: header.student_id,
            class_id: header.class_id,
            term_id: header.term_id,
            academic_year: header.academic_year,
            currency: header.currency.trim().to_string(),
            total_amount: header.total_amount,
            paid_amount: header.paid_amount,
            balance: header.balance,
            status: header.status,
            due_date: header.due_date,
            items: items
                .into_iter()
                .map(|item| InvoiceItemResponse {
                    id: item.invoice_item_id,
                    fee_item_id: item.fee_item_id,
                    description: item.description,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    amount: item.amount,
                    optional: item.optional,
                })
                .collect(),
            schedule: schedule
                .into_iter()
                .map(|entry| ScheduleEntryResponse {
                    label: entry.label,
                    due_date: entry.due_date,
                    amount: entry.amount,
                })
                .collect(),
            created_at: header.created_at,
        }
    }
}

/// Header-only view for listings
#[derive(Debug, Serialize)]
pub struct InvoiceSummaryResponse {
    pub id: Uuid,
    pub invoice_number: String,
    pub student_id: Uuid,
    pub academic_year: i32,
    pub total_amount: Decimal,
    pub balance: Decimal,
    pub status: String,
    pub due_date: NaiveDate,
}

impl From<InvoiceRow> for InvoiceSummaryResponse {
    fn from(row: InvoiceRow) -> Self {
        Self {
            id: row.invoice_id,
            invoice_number: row.invoice_number,
            student_id: row.student_id,
            academic_year: row.academic_year,
            total_amount: row.total_amount,
            balance: row.balance,
            status: row.status,
            due_date: row.due_date,
        }
    }
}
