//! Fee catalog repository
//!
//! Read-mostly access to fee items, charge rules, and installment plans.
//! Rows are mapped back into `domain_fees` types so the resolver and
//! planner run on the same structures everywhere.

use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use core_kernel::{AcademicYear, Currency, Money};
use domain_fees::{FeeItem, FeeItemRule, InstallmentPlan, PlanEntry, PlanEntryKind};

use crate::error::{classify, DatabaseError};

/// Repository for the fee catalog
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct FeeItemRow {
    fee_item_id: Uuid,
    code: String,
    name: String,
    fee_group_id: Option<Uuid>,
    mandatory: bool,
}

#[derive(Debug, FromRow)]
struct FeeRuleRow {
    fee_rule_id: Uuid,
    fee_item_id: Uuid,
    academic_year: i32,
    class_id: Option<Uuid>,
    term_id: Option<Uuid>,
    level: Option<String>,
    amount: Decimal,
    currency: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, FromRow)]
struct PlanRow {
    plan_id: Uuid,
    name: String,
    is_default: bool,
}

#[derive(Debug, FromRow)]
struct PlanEntryRow {
    label: String,
    due_offset_days: i32,
    percent: Option<Decimal>,
    amount: Option<Decimal>,
    currency: Option<String>,
}

fn parse_currency(code: &str) -> Result<Currency, DatabaseError> {
    Currency::from_code(code.trim())
        .ok_or_else(|| DatabaseError::CorruptRow(format!("unknown currency code '{code}'")))
}

impl FeeRuleRow {
    fn into_domain(self) -> Result<FeeItemRule, DatabaseError> {
        let currency = parse_currency(&self.currency)?;
        Ok(FeeItemRule {
            id: self.fee_rule_id.into(),
            fee_item_id: self.fee_item_id.into(),
            academic_year: AcademicYear::new(self.academic_year),
            class_id: self.class_id.map(Into::into),
            term_id: self.term_id.map(Into::into),
            level: self.level,
            amount: Money::new(self.amount, currency),
            created_at: self.created_at,
        })
    }
}

impl CatalogRepository {
    /// Creates a new repository over the given pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetches fee items by ID, in the order requested
    ///
    /// # Errors
    ///
    /// Returns `NotFound` naming the first missing ID, so callers can
    /// reject unknown items before resolution begins.
    pub async fn fee_items(&self, ids: &[Uuid]) -> Result<Vec<FeeItem>, DatabaseError> {
        let rows: Vec<FeeItemRow> = sqlx::query_as(
            r#"
            SELECT fee_item_id, code, name, fee_group_id, mandatory
            FROM fee_items
            WHERE fee_item_id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        let mut ordered = Vec::with_capacity(ids.len());
        for id in ids {
            let row = rows
                .iter()
                .find(|r| r.fee_item_id == *id)
                .ok_or_else(|| DatabaseError::not_found("FeeItem", id))?;
            ordered.push(FeeItem {
                id: row.fee_item_id.into(),
                code: row.code.clone(),
                name: row.name.clone(),
                group_id: row.fee_group_id.map(Into::into),
                mandatory: row.mandatory,
            });
        }
        Ok(ordered)
    }

    /// Loads every rule for an academic year
    pub async fn rules_for_year(
        &self,
        year: AcademicYear,
    ) -> Result<Vec<FeeItemRule>, DatabaseError> {
        let rows: Vec<FeeRuleRow> = sqlx::query_as(
            r#"
            SELECT fee_rule_id, fee_item_id, academic_year, class_id, term_id,
                   level, amount, currency, created_at
            FROM fee_rules
            WHERE academic_year = $1
            ORDER BY created_at
            "#,
        )
        .bind(year.start_year())
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        rows.into_iter().map(FeeRuleRow::into_domain).collect()
    }

    /// Fetches an installment plan with its entries
    pub async fn plan(&self, plan_id: Uuid) -> Result<InstallmentPlan, DatabaseError> {
        let plan: PlanRow = sqlx::query_as(
            r#"SELECT plan_id, name, is_default FROM installment_plans WHERE plan_id = $1"#,
        )
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?
        .ok_or_else(|| DatabaseError::not_found("InstallmentPlan", plan_id))?;

        self.hydrate_plan(plan).await
    }

    /// Fetches the default installment plan, if one is configured
    pub async fn default_plan(&self) -> Result<Option<InstallmentPlan>, DatabaseError> {
        let plan: Option<PlanRow> = sqlx::query_as(
            r#"SELECT plan_id, name, is_default FROM installment_plans WHERE is_default"#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;

        match plan {
            Some(plan) => Ok(Some(self.hydrate_plan(plan).await?)),
            None => Ok(None),
        }
    }

    async fn hydrate_plan(&self, plan: PlanRow) -> Result<InstallmentPlan, DatabaseError> {
        let entry_rows: Vec<PlanEntryRow> = sqlx::query_as(
            r#"
            SELECT label, due_offset_days, percent, amount, currency
            FROM installment_plan_entries
            WHERE plan_id = $1
            ORDER BY position
            "#,
        )
        .bind(plan.plan_id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        let mut entries = Vec::with_capacity(entry_rows.len());
        for row in entry_rows {
            let kind = match (row.percent, row.amount) {
                (Some(percent), None) => PlanEntryKind::Percentage { percent },
                (None, Some(amount)) => {
                    let code = row.currency.as_deref().ok_or_else(|| {
                        DatabaseError::CorruptRow(format!(
                            "fixed plan entry '{}' has no currency",
                            row.label
                        ))
                    })?;
                    PlanEntryKind::Fixed {
                        amount: Money::new(amount, parse_currency(code)?),
                    }
                }
                _ => {
                    return Err(DatabaseError::CorruptRow(format!(
                        "plan entry '{}' is neither percentage nor fixed",
                        row.label
                    )))
                }
            };
            entries.push(PlanEntry {
                label: row.label,
                due_offset_days: i64::from(row.due_offset_days),
                kind,
            });
        }

        Ok(InstallmentPlan {
            id: plan.plan_id.into(),
            name: plan.name,
            is_default: plan.is_default,
            entries,
        })
    }
}
