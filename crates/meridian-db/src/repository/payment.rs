//! # Payment Repository
//!
//! Records payments against invoices and keeps `amount_paid` and the
//! invoice status in step with the payment rows.
//!
//! ## Apply Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply_payment(ctx, NewPayment)                                        │
//! │       │                                                                 │
//! │       ├── validate amount > 0                                          │
//! │       ├── invoice exists and is not cancelled   (pre-check, pool)      │
//! │       ├── allocate PAY-<year>-<seq>                                    │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │       ├── INSERT payment            ← write first, takes the lock      │
//! │       ├── re-read invoice           ← fresh amount_paid                │
//! │       ├── amount_paid += amount                                        │
//! │       ├── status = derive_from_payments(...)                           │
//! │       └── UPDATE invoice                                               │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `delete_payment` runs the same steps in reverse.

use sqlx::SqlitePool;
use tracing::{debug, info};

use meridian_core::document::Invoice;
use meridian_core::money::Money;
use meridian_core::status::InvoiceStatus;
use meridian_core::types::{DocumentKind, NewPayment, Payment};
use meridian_core::validation::{add_payment, validate_payment_amount};
use meridian_core::CoreError;

use crate::context::RequestContext;
use crate::error::{DbError, DbResult};
use crate::repository::common::{
    now, require_document, validate_optional_text, with_document_number, RepoSettings,
};

/// Repository for payments and invoice reconciliation.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
    settings: RepoSettings,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool, settings: RepoSettings) -> Self {
        PaymentRepository { pool, settings }
    }

    /// Gets a payment by ID; `NotFound` if absent.
    pub async fn get_by_id(&self, ctx: &RequestContext, id: i64) -> DbResult<Payment> {
        ctx.run(async {
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DbError::not_found("Payment", id))
        })
        .await
    }

    /// Payments on an invoice in the order they were received.
    pub async fn list_for_invoice(&self, ctx: &RequestContext, invoice_id: i64) -> DbResult<Vec<Payment>> {
        ctx.run(async {
            let payments = sqlx::query_as::<_, Payment>(
                "SELECT * FROM payments WHERE invoice_id = ?1 ORDER BY payment_date, id",
            )
            .bind(invoice_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(payments)
        })
        .await
    }

    /// Records a payment and reconciles its invoice in one transaction.
    ///
    /// ## Returns
    /// The stored payment and the invoice as it stands after the payment.
    ///
    /// ## Errors
    /// - `NotFound` if the invoice does not exist
    /// - `InvalidStatusTransition` if the invoice is cancelled
    /// - `Validation` if the amount is not positive
    pub async fn apply_payment(&self, ctx: &RequestContext, input: &NewPayment) -> DbResult<(Payment, Invoice)> {
        ctx.ensure_live()?;
        validate_payment_amount(input.amount)?;
        validate_optional_text("reference", &input.reference)?;
        validate_optional_text("notes", &input.notes)?;

        let status: Option<InvoiceStatus> =
            sqlx::query_scalar("SELECT status FROM invoices WHERE id = ?1")
                .bind(input.invoice_id)
                .fetch_optional(&self.pool)
                .await?;
        let status = status.ok_or_else(|| DbError::not_found("Invoice", input.invoice_id))?;
        ensure_accepts_payments(status)?;

        let (payment, invoice) = with_document_number(
            &self.pool,
            ctx,
            self.settings,
            DocumentKind::Payment,
            None,
            move |number| self.apply_once(ctx, input, number),
        )
        .await?;

        info!(
            payment_no = %payment.payment_no,
            invoice_id = invoice.id,
            amount = %payment.amount,
            amount_paid = %invoice.amount_paid,
            status = %invoice.status,
            "Payment applied"
        );
        Ok((payment, invoice))
    }

    async fn apply_once(
        &self,
        ctx: &RequestContext,
        input: &NewPayment,
        payment_no: String,
    ) -> DbResult<(Payment, Invoice)> {
        let (tx, (payment, invoice)) = ctx
            .run(async {
                let mut tx = self.pool.begin().await?;

                let payment = sqlx::query_as::<_, Payment>(
                    r#"
                    INSERT INTO payments (
                        payment_no, invoice_id, amount, payment_date, method,
                        reference, notes, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    RETURNING *
                    "#,
                )
                .bind(&payment_no)
                .bind(input.invoice_id)
                .bind(input.amount)
                .bind(input.payment_date)
                .bind(input.method)
                .bind(&input.reference)
                .bind(&input.notes)
                .bind(now())
                .fetch_one(&mut *tx)
                .await?;

                // Re-read under the write lock; the pre-check may be stale.
                let invoice = require_document::<Invoice>(&mut *tx, input.invoice_id).await?;
                ensure_accepts_payments(invoice.status)?;

                let amount_paid = add_payment(invoice.amount_paid, input.amount)?;
                reconcile(&mut *tx, &invoice, amount_paid).await?;
                let invoice = require_document::<Invoice>(&mut *tx, input.invoice_id).await?;
                Ok((tx, (payment, invoice)))
            })
            .await?;
        ctx.commit(tx).await?;

        Ok((payment, invoice))
    }

    /// Deletes a payment and takes its amount back off the invoice.
    ///
    /// An invoice that drops back to nothing paid returns to `sent`.
    pub async fn delete_payment(&self, ctx: &RequestContext, payment_id: i64) -> DbResult<Invoice> {
        ctx.ensure_live()?;

        let (tx, invoice, amount) = ctx
            .run(async {
                let mut tx = self.pool.begin().await?;

                let removed: Option<(i64, Money)> =
                    sqlx::query_as("DELETE FROM payments WHERE id = ?1 RETURNING invoice_id, amount")
                        .bind(payment_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                let (invoice_id, amount) = removed.ok_or_else(|| DbError::not_found("Payment", payment_id))?;

                let invoice = require_document::<Invoice>(&mut *tx, invoice_id).await?;
                let remaining = invoice.amount_paid - amount;
                let amount_paid = if remaining.is_negative() { Money::zero() } else { remaining };
                reconcile(&mut *tx, &invoice, amount_paid).await?;
                let invoice = require_document::<Invoice>(&mut *tx, invoice_id).await?;
                Ok((tx, invoice, amount))
            })
            .await?;
        ctx.commit(tx).await?;

        info!(
            payment_id,
            invoice_id = invoice.id,
            amount = %amount,
            amount_paid = %invoice.amount_paid,
            status = %invoice.status,
            "Payment reversed"
        );
        Ok(invoice)
    }
}

fn ensure_accepts_payments(status: InvoiceStatus) -> DbResult<()> {
    if !status.accepts_payments() {
        return Err(CoreError::invalid_transition(DocumentKind::Invoice, status, InvoiceStatus::Paid).into());
    }
    Ok(())
}

/// Writes the new paid amount and the status it implies.
async fn reconcile(conn: &mut sqlx::SqliteConnection, invoice: &Invoice, amount_paid: Money) -> DbResult<()> {
    let status = InvoiceStatus::derive_from_payments(invoice.status, amount_paid, invoice.grand_total);

    sqlx::query("UPDATE invoices SET amount_paid = ?1, status = ?2, updated_at = ?3 WHERE id = ?4")
        .bind(amount_paid)
        .bind(status)
        .bind(now())
        .bind(invoice.id)
        .execute(&mut *conn)
        .await?;

    debug!(
        invoice_id = invoice.id,
        from = %invoice.status,
        to = %status,
        amount_paid = %amount_paid,
        grand_total = %invoice.grand_total,
        "Reconciled invoice"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_invoice_rejects_payments() {
        assert!(ensure_accepts_payments(InvoiceStatus::Draft).is_ok());
        assert!(ensure_accepts_payments(InvoiceStatus::Overdue).is_ok());
        let err = ensure_accepts_payments(InvoiceStatus::Cancelled).unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidStatusTransition { .. })));
    }
}
