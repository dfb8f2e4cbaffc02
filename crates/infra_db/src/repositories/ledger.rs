//! Ledger repository
//!
//! The persistent counterpart of the domain payment ledger. Every mutating
//! operation runs in one transaction that locks its target invoice row with
//! `SELECT … FOR UPDATE`: concurrent operations against the same invoice
//! serialize, different invoices proceed in parallel. Lock contention and
//! serialization failures retry a bounded number of times with jittered
//! backoff before surfacing a conflict; a transaction that outlives its
//! deadline is dropped, which rolls it back.
//!
//! Notification dispatch happens strictly after commit and is best-effort:
//! a dispatcher failure is the dispatcher's problem, never the ledger's.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use core_kernel::{Currency, Money};
use domain_billing::{BillingError, LedgerEvent, NotificationDispatcher, PostPayment};

use crate::error::{classify, DatabaseError, RepositoryError};

/// Retry and deadline settings for ledger transactions
#[derive(Debug, Clone)]
pub struct RetrySettings {
    /// Attempts before a transient conflict is surfaced to the caller
    pub max_attempts: u32,
    /// Base backoff; each retry doubles it and adds jitter up to the base
    pub base_backoff: Duration,
    /// Per-transaction deadline; exceeding it aborts and rolls back
    pub deadline: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(50),
            deadline: Duration::from_secs(5),
        }
    }
}

/// Stored payment record
#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub method: String,
    pub status: String,
    pub idempotency_key: String,
    pub received_by: Uuid,
    pub reference: Option<String>,
    pub reason: Option<String>,
    pub refunded_total: Decimal,
    pub posted_at: chrono::DateTime<Utc>,
    pub reversed_at: Option<chrono::DateTime<Utc>>,
    pub created_at: chrono::DateTime<Utc>,
}

/// The invoice columns a ledger transaction works on
#[derive(Debug, Clone, FromRow)]
struct LedgerInvoiceRow {
    invoice_id: Uuid,
    invoice_number: String,
    currency: String,
    total_amount: Decimal,
    paid_amount: Decimal,
    balance: Decimal,
    status: String,
}

/// Repository for ledger mutations
#[derive(Clone)]
pub struct LedgerRepository {
    pool: PgPool,
    settings: RetrySettings,
    dispatcher: Option<Arc<dyn NotificationDispatcher>>,
}

impl LedgerRepository {
    /// Creates a repository with default retry settings
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            settings: RetrySettings::default(),
            dispatcher: None,
        }
    }

    /// Overrides the retry settings
    pub fn with_settings(mut self, settings: RetrySettings) -> Self {
        self.settings = settings;
        self
    }

    /// Attaches a post-commit notification dispatcher
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Posts a payment against an invoice
    ///
    /// Replaying an idempotency key already recorded for the invoice
    /// returns the stored payment unchanged. Otherwise the payment row,
    /// the running totals, and the derived status commit together.
    pub async fn post_payment(
        &self,
        invoice_id: Uuid,
        cmd: &PostPayment,
    ) -> Result<PaymentRow, RepositoryError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = tokio::time::timeout(
                self.settings.deadline,
                self.try_post_payment(invoice_id, cmd),
            )
            .await;

            match outcome {
                Ok(Ok((row, fresh))) => {
                    if fresh {
                        self.notify(LedgerEvent::PaymentPosted {
                            invoice_id: invoice_id.into(),
                            payment_id: row.payment_id.into(),
                            amount: cmd.amount,
                        });
                    }
                    return Ok(row);
                }
                Ok(Err(e)) => self.handle_attempt_error("post_payment", attempt, e).await?,
                Err(_) => return Err(self.deadline_error().into()),
            }
        }
    }

    /// Voids an applied payment, reversing its full amount
    pub async fn void_payment(
        &self,
        payment_id: Uuid,
        reason: &str,
    ) -> Result<(), RepositoryError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = tokio::time::timeout(
                self.settings.deadline,
                self.try_void_payment(payment_id, reason),
            )
            .await;

            match outcome {
                Ok(Ok((invoice_id, amount))) => {
                    self.notify(LedgerEvent::PaymentVoided {
                        invoice_id: invoice_id.into(),
                        payment_id: payment_id.into(),
                        amount,
                    });
                    return Ok(());
                }
                Ok(Err(e)) => self.handle_attempt_error("void_payment", attempt, e).await?,
                Err(_) => return Err(self.deadline_error().into()),
            }
        }
    }

    /// Refunds part or all of an applied payment
    pub async fn refund_payment(
        &self,
        payment_id: Uuid,
        amount: Money,
        reason: &str,
    ) -> Result<(), RepositoryError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = tokio::time::timeout(
                self.settings.deadline,
                self.try_refund_payment(payment_id, amount, reason),
            )
            .await;

            match outcome {
                Ok(Ok(invoice_id)) => {
                    self.notify(LedgerEvent::PaymentRefunded {
                        invoice_id: invoice_id.into(),
                        payment_id: payment_id.into(),
                        amount,
                    });
                    return Ok(());
                }
                Ok(Err(e)) => {
                    self.handle_attempt_error("refund_payment", attempt, e)
                        .await?
                }
                Err(_) => return Err(self.deadline_error().into()),
            }
        }
    }

    /// Submits a draft invoice for approval
    pub async fn submit_invoice(&self, invoice_id: Uuid) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        let invoice = self.lock_invoice(&mut tx, invoice_id).await?;
        if invoice.status != "draft" {
            return Err(BillingError::state(format!(
                "invoice {} cannot be submitted from status {}",
                invoice.invoice_number, invoice.status
            ))
            .into());
        }
        sqlx::query(
            r#"UPDATE invoices SET status = 'pending_approval', updated_at = now()
               WHERE invoice_id = $1"#,
        )
        .bind(invoice_id)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;
        tx.commit().await.map_err(classify)?;
        Ok(())
    }

    /// Approves a pending invoice, opening it for payment
    pub async fn approve_invoice(
        &self,
        invoice_id: Uuid,
        approver: Uuid,
        notes: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        let invoice = self.lock_invoice(&mut tx, invoice_id).await?;
        if invoice.status != "pending_approval" {
            return Err(BillingError::state(format!(
                "invoice {} cannot be approved from status {}",
                invoice.invoice_number, invoice.status
            ))
            .into());
        }
        sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'approved', approved_by = $2, approval_notes = $3,
                approved_at = now(), updated_at = now()
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice_id)
        .bind(approver)
        .bind(notes)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;
        tx.commit().await.map_err(classify)?;

        info!(invoice = %invoice.invoice_number, "invoice approved");
        self.notify(LedgerEvent::InvoiceApproved {
            invoice_id: invoice_id.into(),
            approver: approver.into(),
        });
        Ok(())
    }

    /// Rejects a pending invoice; absorbing
    pub async fn reject_invoice(
        &self,
        invoice_id: Uuid,
        reason: &str,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        let invoice = self.lock_invoice(&mut tx, invoice_id).await?;
        if invoice.status != "pending_approval" {
            return Err(BillingError::state(format!(
                "invoice {} cannot be rejected from status {}",
                invoice.invoice_number, invoice.status
            ))
            .into());
        }
        sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'rejected', rejection_reason = $2, updated_at = now()
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice_id)
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;
        tx.commit().await.map_err(classify)?;

        info!(invoice = %invoice.invoice_number, %reason, "invoice rejected");
        self.notify(LedgerEvent::InvoiceRejected {
            invoice_id: invoice_id.into(),
            reason: reason.to_string(),
        });
        Ok(())
    }

    // One optimistic pass of post_payment. Returns the payment row and
    // whether it was freshly inserted (false = idempotent replay).
    async fn try_post_payment(
        &self,
        invoice_id: Uuid,
        cmd: &PostPayment,
    ) -> Result<(PaymentRow, bool), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        if let Some(existing) = self
            .find_by_idempotency_key(&mut tx, invoice_id, &cmd.idempotency_key)
            .await?
        {
            tx.rollback().await.ok();
            return Ok((existing, false));
        }

        let invoice = self.lock_invoice(&mut tx, invoice_id).await?;
        let currency = parse_currency(&invoice.currency)?;
        if cmd.amount.currency() != currency {
            return Err(BillingError::validation(format!(
                "amount currency {} does not match invoice currency {}",
                cmd.amount.currency(),
                currency
            ))
            .into());
        }
        if !matches!(invoice.status.as_str(), "approved" | "partial") {
            return Err(BillingError::state(format!(
                "invoice {} is not payable in status {}",
                invoice.invoice_number, invoice.status
            ))
            .into());
        }
        let amount = cmd.amount.amount();
        if amount <= Decimal::ZERO {
            return Err(BillingError::validation("payment amount must be positive").into());
        }
        if amount > invoice.balance && !cmd.allow_overpayment {
            return Err(BillingError::state(format!(
                "payment {} exceeds balance {} and overpayment is not allowed",
                cmd.amount, invoice.balance
            ))
            .into());
        }

        let new_paid = invoice.paid_amount + amount;
        let new_balance = invoice.balance - amount;
        let new_status = derive_status(invoice.total_amount, new_balance);

        let insert = sqlx::query_as::<_, PaymentRow>(
            r#"
            INSERT INTO payments (
                payment_id, invoice_id, amount, currency, method, status,
                idempotency_key, received_by, posted_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, 'applied', $6, $7, now(), now())
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(invoice_id)
        .bind(amount)
        .bind(invoice.currency.trim())
        .bind(cmd.method.as_str())
        .bind(&cmd.idempotency_key)
        .bind(*cmd.received_by.as_uuid())
        .fetch_one(&mut *tx)
        .await;

        let payment = match insert {
            Ok(row) => row,
            // A racing request inserted the same key first; retry so the
            // idempotency lookup returns its payment
            Err(e) => {
                return Err(match classify(e) {
                    DatabaseError::DuplicateEntry(msg) => {
                        DatabaseError::TransientConflict(msg).into()
                    }
                    other => other.into(),
                })
            }
        };

        self.update_invoice_totals(&mut tx, invoice_id, new_paid, new_balance, new_status)
            .await?;
        tx.commit().await.map_err(classify)?;

        info!(
            invoice = %invoice.invoice_number,
            payment = %payment.payment_id,
            amount = %cmd.amount,
            status = new_status,
            "payment posted"
        );
        Ok((payment, true))
    }

    async fn try_void_payment(
        &self,
        payment_id: Uuid,
        reason: &str,
    ) -> Result<(Uuid, Money), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let payment = self.lock_payment(&mut tx, payment_id).await?;
        if payment.status != "applied" || payment.refunded_total > Decimal::ZERO {
            return Err(BillingError::state(format!(
                "payment {} cannot be voided (status {}, refunded {})",
                payment_id, payment.status, payment.refunded_total
            ))
            .into());
        }

        let invoice = self
            .lock_invoice(&mut tx, payment.invoice_id)
            .await
            .map_err(|_| {
                BillingError::invariant(format!(
                    "payment {payment_id} references missing invoice {}",
                    payment.invoice_id
                ))
            })?;
        let currency = parse_currency(&invoice.currency)?;
        self.reverse_invoice_amount(&mut tx, &invoice, payment.amount)
            .await?;

        sqlx::query(
            r#"
            UPDATE payments
            SET status = 'voided', reason = $2, reversed_at = now()
            WHERE payment_id = $1
            "#,
        )
        .bind(payment_id)
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;
        tx.commit().await.map_err(classify)?;

        info!(
            invoice = %invoice.invoice_number,
            payment = %payment_id,
            amount = %payment.amount,
            "payment voided"
        );
        Ok((payment.invoice_id, Money::new(payment.amount, currency)))
    }

    async fn try_refund_payment(
        &self,
        payment_id: Uuid,
        amount: Money,
        reason: &str,
    ) -> Result<Uuid, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let payment = self.lock_payment(&mut tx, payment_id).await?;
        if payment.status != "applied" {
            return Err(BillingError::state(format!(
                "payment {} cannot be refunded in status {}",
                payment_id, payment.status
            ))
            .into());
        }
        if amount.amount() <= Decimal::ZERO {
            return Err(BillingError::validation("refund amount must be positive").into());
        }
        let remaining = payment.amount - payment.refunded_total;
        if amount.amount() > remaining {
            return Err(BillingError::validation(format!(
                "refund {} exceeds remaining applied amount {}",
                amount, remaining
            ))
            .into());
        }

        let invoice = self
            .lock_invoice(&mut tx, payment.invoice_id)
            .await
            .map_err(|_| {
                BillingError::invariant(format!(
                    "payment {payment_id} references missing invoice {}",
                    payment.invoice_id
                ))
            })?;
        let currency = parse_currency(&invoice.currency)?;
        if amount.currency() != currency {
            return Err(BillingError::validation(format!(
                "refund currency {} does not match invoice currency {}",
                amount.currency(),
                currency
            ))
            .into());
        }
        self.reverse_invoice_amount(&mut tx, &invoice, amount.amount())
            .await?;

        let new_refunded = payment.refunded_total + amount.amount();
        let fully_refunded = new_refunded == payment.amount;
        sqlx::query(
            r#"
            UPDATE payments
            SET refunded_total = $2,
                reason = $3,
                status = CASE WHEN $4 THEN 'refunded' ELSE status END,
                reversed_at = CASE WHEN $4 THEN now() ELSE reversed_at END
            WHERE payment_id = $1
            "#,
        )
        .bind(payment_id)
        .bind(new_refunded)
        .bind(reason)
        .bind(fully_refunded)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;
        tx.commit().await.map_err(classify)?;

        info!(
            invoice = %invoice.invoice_number,
            payment = %payment_id,
            amount = %amount,
            refunded_total = %new_refunded,
            "payment refunded"
        );
        Ok(payment.invoice_id)
    }

    // Applies a reversal to the locked invoice row
    async fn reverse_invoice_amount(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        invoice: &LedgerInvoiceRow,
        amount: Decimal,
    ) -> Result<(), RepositoryError> {
        if matches!(invoice.status.as_str(), "rejected" | "cancelled") {
            return Err(BillingError::state(format!(
                "invoice {} is {} and admits no further operations",
                invoice.invoice_number, invoice.status
            ))
            .into());
        }
        let new_paid = invoice.paid_amount - amount;
        if new_paid < Decimal::ZERO {
            return Err(BillingError::invariant(format!(
                "reversal {} exceeds paid amount {} on invoice {}",
                amount, invoice.paid_amount, invoice.invoice_number
            ))
            .into());
        }
        let new_balance = invoice.balance + amount;
        let new_status = derive_status(invoice.total_amount, new_balance);

        self.update_invoice_totals(tx, invoice.invoice_id, new_paid, new_balance, new_status)
            .await
    }

    async fn update_invoice_totals(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        invoice_id: Uuid,
        paid: Decimal,
        balance: Decimal,
        status: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE invoices
            SET paid_amount = $2, balance = $3, status = $4, updated_at = now()
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice_id)
        .bind(paid)
        .bind(balance)
        .bind(status)
        .execute(&mut **tx)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn lock_invoice(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        invoice_id: Uuid,
    ) -> Result<LedgerInvoiceRow, RepositoryError> {
        sqlx::query_as::<_, LedgerInvoiceRow>(
            r#"
            SELECT invoice_id, invoice_number, currency, total_amount,
                   paid_amount, balance, status
            FROM invoices
            WHERE invoice_id = $1
            FOR UPDATE
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(classify)?
        .ok_or_else(|| BillingError::InvoiceNotFound(invoice_id.to_string()).into())
    }

    async fn lock_payment(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        payment_id: Uuid,
    ) -> Result<PaymentRow, RepositoryError> {
        sqlx::query_as::<_, PaymentRow>(
            r#"SELECT * FROM payments WHERE payment_id = $1 FOR UPDATE"#,
        )
        .bind(payment_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(classify)?
        .ok_or_else(|| BillingError::PaymentNotFound(payment_id.to_string()).into())
    }

    async fn find_by_idempotency_key(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        invoice_id: Uuid,
        key: &str,
    ) -> Result<Option<PaymentRow>, RepositoryError> {
        sqlx::query_as::<_, PaymentRow>(
            r#"SELECT * FROM payments WHERE invoice_id = $1 AND idempotency_key = $2"#,
        )
        .bind(invoice_id)
        .bind(key)
        .fetch_optional(&mut **tx)
        .await
        .map_err(classify)
        .map_err(Into::into)
    }

    // Swallows transient errors while attempts remain, sleeping with
    // jittered exponential backoff; everything else propagates
    async fn handle_attempt_error(
        &self,
        operation: &str,
        attempt: u32,
        error: RepositoryError,
    ) -> Result<(), RepositoryError> {
        let transient = matches!(
            &error,
            RepositoryError::Database(db) if db.is_transient()
        );
        if !transient {
            return Err(error);
        }
        if attempt >= self.settings.max_attempts {
            warn!(operation, attempt, "retries exhausted on invoice conflict");
            return Err(DatabaseError::RetryExhausted {
                attempts: self.settings.max_attempts,
            }
            .into());
        }

        let base = self.settings.base_backoff * 2u32.pow(attempt - 1);
        let jitter =
            Duration::from_millis(rand::thread_rng().gen_range(0..=self.settings.base_backoff.as_millis() as u64));
        warn!(operation, attempt, "transient conflict, retrying");
        tokio::time::sleep(base + jitter).await;
        Ok(())
    }

    fn deadline_error(&self) -> DatabaseError {
        DatabaseError::DeadlineExceeded {
            deadline_ms: self.settings.deadline.as_millis() as u64,
        }
    }

    fn notify(&self, event: LedgerEvent) {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.notify(event);
        }
    }
}

fn parse_currency(code: &str) -> Result<Currency, DatabaseError> {
    Currency::from_code(code.trim())
        .ok_or_else(|| DatabaseError::CorruptRow(format!("unknown currency code '{code}'")))
}

/// Derives invoice status from the post-mutation balance
fn derive_status(total: Decimal, balance: Decimal) -> &'static str {
    if balance <= Decimal::ZERO {
        "paid"
    } else if balance < total {
        "partial"
    } else {
        "approved"
    }
}
