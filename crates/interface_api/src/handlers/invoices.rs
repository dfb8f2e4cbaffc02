//! Invoice handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::AcademicYear;
use domain_billing::{InvoiceGenerator, LedgerEvent};
use domain_fees::{FeeRuleResolver, StudentContext};
use infra_db::{CatalogRepository, InvoiceFilter, InvoiceRepository};

use crate::dto::invoices::*;
use crate::error::ApiError;
use crate::AppState;

/// Generates a draft invoice and persists it
pub async fn generate_invoice(
    State(state): State<AppState>,
    Json(request): Json<GenerateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), ApiError> {
    request.validate()?;
    let currency = state.currency()?;
    let year = AcademicYear::new(request.academic_year);

    let catalog = CatalogRepository::new(state.pool.clone());
    let fee_items = catalog.fee_items(&request.fee_item_ids).await?;
    let rules = catalog.rules_for_year(year).await?;
    let plan = match request.installment_plan_id {
        Some(plan_id) => Some(catalog.plan(plan_id).await?),
        None => None,
    };

    let level = match request.level {
        Some(level) => Some(level),
        None => state.lookup_level(request.student_id).await?,
    };

    let ctx = StudentContext {
        student_id: request.student_id.into(),
        class_id: request.class_id.into(),
        term_id: request.term_id.into(),
        level,
        academic_year: year,
    };

    let generator = InvoiceGenerator::new(FeeRuleResolver::new(rules), currency);
    let mut invoice = generator.generate(&ctx, &fee_items, plan.as_ref(), request.due_date)?;

    // The persistent path allocates its number from the counter table,
    // which is collision-free across processes
    let invoices = InvoiceRepository::new(state.pool.clone());
    invoice.invoice_number = invoices.allocate_number(year).await?;
    invoices.create(&invoice).await?;

    state.dispatcher.notify(LedgerEvent::InvoiceGenerated {
        invoice_id: invoice.id,
        student_id: invoice.student_id,
        total: invoice.total_amount,
    });

    Ok((StatusCode::CREATED, Json(InvoiceResponse::from(&invoice))))
}

/// Gets an invoice with its items and schedule
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let invoices = InvoiceRepository::new(state.pool.clone());
    let header = invoices.get(invoice_id).await?;
    let items = invoices.items(invoice_id).await?;
    let schedule = invoices.schedule(invoice_id).await?;
    Ok(Json(InvoiceResponse::from_rows(header, items, schedule)))
}

/// Lists invoice headers
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<Vec<InvoiceSummaryResponse>>, ApiError> {
    let invoices = InvoiceRepository::new(state.pool.clone());
    let filter = InvoiceFilter {
        student_id: query.student_id,
        status: query.status,
        academic_year: query.academic_year,
        limit: query.limit.unwrap_or(50),
    };
    let rows = invoices.list(&filter).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Submits a draft invoice for approval
pub async fn submit_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    state.ledger().submit_invoice(invoice_id).await?;
    fetch_response(&state, invoice_id).await
}

/// Approves a pending invoice
pub async fn approve_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<ApproveInvoiceRequest>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    request.validate()?;
    state
        .ledger()
        .approve_invoice(invoice_id, request.approver_id, request.notes.as_deref())
        .await?;
    fetch_response(&state, invoice_id).await
}

/// Rejects a pending invoice
pub async fn reject_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<RejectInvoiceRequest>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    request.validate()?;
    state
        .ledger()
        .reject_invoice(invoice_id, &request.reason)
        .await?;
    fetch_response(&state, invoice_id).await
}

async fn fetch_response(
    state: &AppState,
    invoice_id: Uuid,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let invoices = InvoiceRepository::new(state.pool.clone());
    let header = invoices.get(invoice_id).await?;
    let items = invoices.items(invoice_id).await?;
    let schedule = invoices.schedule(invoice_id).await?;
    Ok(Json(InvoiceResponse::from_rows(header, items, schedule)))
}
