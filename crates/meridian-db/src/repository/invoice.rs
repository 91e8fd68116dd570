//! # Invoice Repository
//!
//! Invoices bill a customer and collect payments.
//!
//! ## Status Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  caller (update / update_status)   draft → sent, → overdue, → cancelled │
//! │  payments (payment repository)     → partial, → paid, back to → sent   │
//! │  mark_overdue sweep                sent/partial past due → overdue     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `amount_paid` is only ever written by the payment repository. Every
//! update re-derives partial/paid against the new grand total, whatever
//! status the caller sent.

use chrono::NaiveDate;
use tracing::info;

use meridian_core::document::{Invoice, NewInvoice, SalesOrder};
use meridian_core::status::InvoiceStatus;
use meridian_core::totals::DocumentTotals;
use meridian_core::types::{DocumentKind, LineItem};

use crate::context::RequestContext;
use crate::error::DbResult;
use crate::repository::common::{
    delete_items, ensure_exists, ensure_initial, fetch_by_column, insert_items, lock_row,
    next_status, now, parent_document_no, prepare_document, require_document, with_document_number,
    Dependent, DocTable, DocumentRecord,
};
use crate::repository::document::DocumentRepository;

pub type InvoiceRepository = DocumentRepository<Invoice>;

impl DocumentRecord for Invoice {
    const TABLE: DocTable = DocTable {
        kind: DocumentKind::Invoice,
        table: "invoices",
        items_table: "invoice_items",
        parent_column: "invoice_id",
        dependents: &[Dependent {
            kind: DocumentKind::Payment,
            table: "payments",
            column: "invoice_id",
        }],
    };
}

impl DocumentRepository<Invoice> {
    /// Creates an invoice in `draft` with nothing paid.
    pub async fn create(&self, ctx: &RequestContext, input: &NewInvoice) -> DbResult<Invoice> {
        ctx.ensure_live()?;
        let status = ensure_initial(input.status)?;
        parent_document_no(&self.pool, SalesOrder::TABLE, input.sales_order_id).await?;

        let lines = prepare_document(&self.pool, input.contact_id, &input.notes, &input.items).await?;
        let totals = DocumentTotals::compute(&lines);
        let lines = &lines;

        let id = with_document_number(
            &self.pool,
            ctx,
            self.settings,
            DocumentKind::Invoice,
            input.document_no.as_deref(),
            move |number| self.insert_once(ctx, input, status, lines, totals, number),
        )
        .await?;

        self.get_by_id(ctx, id).await
    }

    async fn insert_once(
        &self,
        ctx: &RequestContext,
        input: &NewInvoice,
        status: InvoiceStatus,
        lines: &[LineItem],
        totals: DocumentTotals,
        document_no: String,
    ) -> DbResult<i64> {
        let (tx, id) = ctx
            .run(async {
                let mut tx = self.pool.begin().await?;
                let id = insert_invoice_row(
                    &mut *tx,
                    &InvoiceRow {
                        document_no: &document_no,
                        contact_id: input.contact_id,
                        sales_order_id: input.sales_order_id,
                        status,
                        due_date: input.due_date,
                        notes: input.notes.as_deref(),
                        totals,
                    },
                )
                .await?;
                insert_items(&mut *tx, Invoice::TABLE, id, lines).await?;
                Ok((tx, id))
            })
            .await?;
        ctx.commit(tx).await?;

        info!(id, document_no = %document_no, grand_total = %totals.grand_total, "Created invoice");
        Ok(id)
    }

    /// Replaces header fields and items; totals are recomputed.
    pub async fn update(&self, ctx: &RequestContext, id: i64, input: &NewInvoice) -> DbResult<Invoice> {
        ctx.ensure_live()?;
        ensure_exists(&self.pool, Invoice::TABLE, id).await?;
        parent_document_no(&self.pool, SalesOrder::TABLE, input.sales_order_id).await?;

        let lines = prepare_document(&self.pool, input.contact_id, &input.notes, &input.items).await?;
        let totals = DocumentTotals::compute(&lines);

        let (tx, updated) = ctx
            .run(async {
                let mut tx = self.pool.begin().await?;
                lock_row(&mut *tx, Invoice::TABLE, id).await?;

                let current = require_document::<Invoice>(&mut *tx, id).await?;
                let requested = next_status(current.status, input.status)?;
                // a new grand total can move a payment-driven status
                let status = InvoiceStatus::after_edit(requested, current.amount_paid, totals.grand_total);

                sqlx::query(
                    r#"
                    UPDATE invoices SET
                        contact_id = ?1, sales_order_id = ?2, status = ?3, due_date = ?4,
                        subtotal = ?5, tax_total = ?6, discount_total = ?7, grand_total = ?8,
                        notes = ?9, updated_at = ?10
                    WHERE id = ?11
                    "#,
                )
                .bind(input.contact_id)
                .bind(input.sales_order_id)
                .bind(status)
                .bind(input.due_date)
                .bind(totals.subtotal)
                .bind(totals.tax_total)
                .bind(totals.discount_total)
                .bind(totals.grand_total)
                .bind(&input.notes)
                .bind(now())
                .bind(id)
                .execute(&mut *tx)
                .await?;

                delete_items(&mut *tx, Invoice::TABLE, id).await?;
                insert_items(&mut *tx, Invoice::TABLE, id, &lines).await?;

                let updated = require_document::<Invoice>(&mut *tx, id).await?;
                Ok((tx, updated))
            })
            .await?;
        ctx.commit(tx).await?;

        info!(id, status = %updated.status, "Updated invoice");
        Ok(updated)
    }

    /// Marks `sent` and `partial` invoices due before `today` as `overdue`.
    pub async fn mark_overdue(&self, ctx: &RequestContext, today: NaiveDate) -> DbResult<u64> {
        ctx.run(async {
            let result = sqlx::query(
                r#"
                UPDATE invoices SET status = ?1, updated_at = ?2
                WHERE status IN (?3, ?4) AND due_date IS NOT NULL AND due_date < ?5
                "#,
            )
            .bind(InvoiceStatus::Overdue)
            .bind(now())
            .bind(InvoiceStatus::Sent)
            .bind(InvoiceStatus::Partial)
            .bind(today)
            .execute(&self.pool)
            .await?;

            let swept = result.rows_affected();
            if swept > 0 {
                info!(swept, %today, "Marked invoices overdue");
            }
            Ok(swept)
        })
        .await
    }

    /// Invoices raised against a sales order, most recent first.
    pub async fn get_by_sales_order(&self, ctx: &RequestContext, sales_order_id: i64) -> DbResult<Vec<Invoice>> {
        ctx.run(async {
            let mut conn = self.pool.acquire().await?;
            fetch_by_column::<Invoice>(&mut *conn, "sales_order_id", sales_order_id).await
        })
        .await
    }
}

pub(crate) struct InvoiceRow<'a> {
    pub document_no: &'a str,
    pub contact_id: i64,
    pub sales_order_id: Option<i64>,
    pub status: InvoiceStatus,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<&'a str>,
    pub totals: DocumentTotals,
}

pub(crate) async fn insert_invoice_row(
    conn: &mut sqlx::SqliteConnection,
    row: &InvoiceRow<'_>,
) -> DbResult<i64> {
    let stamp = now();
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO invoices (
            document_no, contact_id, sales_order_id, status, due_date, amount_paid,
            subtotal, tax_total, discount_total, grand_total,
            notes, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
        RETURNING id
        "#,
    )
    .bind(row.document_no)
    .bind(row.contact_id)
    .bind(row.sales_order_id)
    .bind(row.status)
    .bind(row.due_date)
    .bind(row.totals.subtotal)
    .bind(row.totals.tax_total)
    .bind(row.totals.discount_total)
    .bind(row.totals.grand_total)
    .bind(row.notes)
    .bind(stamp)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}
