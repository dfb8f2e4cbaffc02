//! Collections handlers

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;

use infra_db::CollectionsQueries;

use crate::dto::collections::*;
use crate::dto::invoices::InvoiceSummaryResponse;
use crate::error::ApiError;
use crate::AppState;

/// Lists overdue invoices as of a date
pub async fn overdue(
    State(state): State<AppState>,
    Query(query): Query<OverdueQuery>,
) -> Result<Json<Vec<InvoiceSummaryResponse>>, ApiError> {
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let queries = CollectionsQueries::new(state.pool.clone());
    let rows = queries
        .overdue_invoices(as_of, query.limit.unwrap_or(100))
        .await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Aging buckets as of a date
pub async fn aging(
    State(state): State<AppState>,
    Query(query): Query<AgingQuery>,
) -> Result<Json<AgingReportResponse>, ApiError> {
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let queries = CollectionsQueries::new(state.pool.clone());
    let buckets = queries.aging_buckets(as_of).await?;
    Ok(Json(AgingReportResponse {
        as_of,
        buckets: buckets.into_iter().map(Into::into).collect(),
    }))
}

/// Top debtors by outstanding balance
pub async fn top_debtors(
    State(state): State<AppState>,
    Query(query): Query<DebtorsQuery>,
) -> Result<Json<Vec<DebtorResponse>>, ApiError> {
    let queries = CollectionsQueries::new(state.pool.clone());
    let rows = queries.top_debtors(query.limit.unwrap_or(10)).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}
