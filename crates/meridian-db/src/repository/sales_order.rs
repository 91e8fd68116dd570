//! # Sales Order Repository
//!
//! Sales orders sit in the middle of the chain: created directly or by
//! converting an accepted quotation, and the parent of purchase orders,
//! deliveries and invoices. Deletion is blocked while any of those exist.

use tracing::info;

use meridian_core::document::{NewSalesOrder, Quotation, SalesOrder};
use meridian_core::status::SalesOrderStatus;
use meridian_core::totals::DocumentTotals;
use meridian_core::types::{DocumentKind, LineItem};

use crate::context::RequestContext;
use crate::error::DbResult;
use crate::repository::common::{
    delete_items, ensure_exists, ensure_initial, fetch_by_column, insert_items, lock_row,
    next_status, now, parent_document_no, prepare_document, require_document,
    validate_optional_text, with_document_number, Dependent, DocTable, DocumentRecord,
};
use crate::repository::document::DocumentRepository;

pub type SalesOrderRepository = DocumentRepository<SalesOrder>;

impl DocumentRecord for SalesOrder {
    const TABLE: DocTable = DocTable {
        kind: DocumentKind::SalesOrder,
        table: "sales_orders",
        items_table: "sales_order_items",
        parent_column: "sales_order_id",
        // Checked in this order; the first with rows is reported.
        dependents: &[
            Dependent {
                kind: DocumentKind::PurchaseOrder,
                table: "purchase_orders",
                column: "sales_order_id",
            },
            Dependent {
                kind: DocumentKind::Delivery,
                table: "deliveries",
                column: "sales_order_id",
            },
            Dependent {
                kind: DocumentKind::Invoice,
                table: "invoices",
                column: "sales_order_id",
            },
        ],
    };
}

impl DocumentRepository<SalesOrder> {
    /// Creates a sales order in `draft`.
    ///
    /// Use [`crate::conversion::ConversionEngine`] to create one from a
    /// quotation; this path only records the optional `quotation_id` link.
    pub async fn create(&self, ctx: &RequestContext, input: &NewSalesOrder) -> DbResult<SalesOrder> {
        ctx.ensure_live()?;
        let status = ensure_initial(input.status)?;
        validate_optional_text("payment_terms", &input.payment_terms)?;
        parent_document_no(&self.pool, Quotation::TABLE, input.quotation_id).await?;

        let lines = prepare_document(&self.pool, input.contact_id, &input.notes, &input.items).await?;
        let totals = DocumentTotals::compute(&lines);
        let lines = &lines;

        let id = with_document_number(
            &self.pool,
            ctx,
            self.settings,
            DocumentKind::SalesOrder,
            input.document_no.as_deref(),
            move |number| self.insert_once(ctx, input, status, lines, totals, number),
        )
        .await?;

        self.get_by_id(ctx, id).await
    }

    async fn insert_once(
        &self,
        ctx: &RequestContext,
        input: &NewSalesOrder,
        status: SalesOrderStatus,
        lines: &[LineItem],
        totals: DocumentTotals,
        document_no: String,
    ) -> DbResult<i64> {
        let (tx, id) = ctx
            .run(async {
                let mut tx = self.pool.begin().await?;

                let id = insert_sales_order_row(
                    &mut *tx,
                    &SalesOrderRow {
                        document_no: &document_no,
                        contact_id: input.contact_id,
                        quotation_id: input.quotation_id,
                        status,
                        expected_date: input.expected_date,
                        payment_terms: input.payment_terms.as_deref(),
                        notes: input.notes.as_deref(),
                        totals,
                    },
                )
                .await?;
                insert_items(&mut *tx, SalesOrder::TABLE, id, lines).await?;
                Ok((tx, id))
            })
            .await?;
        ctx.commit(tx).await?;

        info!(id, document_no = %document_no, grand_total = %totals.grand_total, "Created sales order");
        Ok(id)
    }

    /// Replaces header fields and items; totals are recomputed.
    pub async fn update(&self, ctx: &RequestContext, id: i64, input: &NewSalesOrder) -> DbResult<SalesOrder> {
        ctx.ensure_live()?;
        ensure_exists(&self.pool, SalesOrder::TABLE, id).await?;
        validate_optional_text("payment_terms", &input.payment_terms)?;
        parent_document_no(&self.pool, Quotation::TABLE, input.quotation_id).await?;

        let lines = prepare_document(&self.pool, input.contact_id, &input.notes, &input.items).await?;
        let totals = DocumentTotals::compute(&lines);

        let (tx, updated) = ctx
            .run(async {
                let mut tx = self.pool.begin().await?;
                lock_row(&mut *tx, SalesOrder::TABLE, id).await?;

                let current = require_document::<SalesOrder>(&mut *tx, id).await?;
                let status = next_status(current.status, input.status)?;

                sqlx::query(
                    r#"
                    UPDATE sales_orders SET
                        contact_id = ?1, quotation_id = ?2, status = ?3, expected_date = ?4,
                        payment_terms = ?5, subtotal = ?6, tax_total = ?7, discount_total = ?8,
                        grand_total = ?9, notes = ?10, updated_at = ?11
                    WHERE id = ?12
                    "#,
                )
                .bind(input.contact_id)
                .bind(input.quotation_id)
                .bind(status)
                .bind(input.expected_date)
                .bind(&input.payment_terms)
                .bind(totals.subtotal)
                .bind(totals.tax_total)
                .bind(totals.discount_total)
                .bind(totals.grand_total)
                .bind(&input.notes)
                .bind(now())
                .bind(id)
                .execute(&mut *tx)
                .await?;

                delete_items(&mut *tx, SalesOrder::TABLE, id).await?;
                insert_items(&mut *tx, SalesOrder::TABLE, id, &lines).await?;

                let updated = require_document::<SalesOrder>(&mut *tx, id).await?;
                Ok((tx, updated))
            })
            .await?;
        ctx.commit(tx).await?;

        info!(id, status = %updated.status, items = lines.len(), "Updated sales order");
        Ok(updated)
    }

    /// Sales orders created from `quotation_id`, most recent first.
    ///
    /// Conversion does not stop a quotation from being converted twice;
    /// callers that want that guard check this first.
    pub async fn get_by_quotation(&self, ctx: &RequestContext, quotation_id: i64) -> DbResult<Vec<SalesOrder>> {
        ctx.run(async {
            let mut conn = self.pool.acquire().await?;
            fetch_by_column::<SalesOrder>(&mut *conn, "quotation_id", quotation_id).await
        })
        .await
    }
}

/// Header values for a new `sales_orders` row.
pub(crate) struct SalesOrderRow<'a> {
    pub document_no: &'a str,
    pub contact_id: i64,
    pub quotation_id: Option<i64>,
    pub status: SalesOrderStatus,
    pub expected_date: Option<chrono::NaiveDate>,
    pub payment_terms: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub totals: DocumentTotals,
}

/// Inserts the header row and returns its id. Shared with conversion.
pub(crate) async fn insert_sales_order_row(
    conn: &mut sqlx::SqliteConnection,
    row: &SalesOrderRow<'_>,
) -> DbResult<i64> {
    let stamp = now();
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO sales_orders (
            document_no, contact_id, quotation_id, status, expected_date, payment_terms,
            subtotal, tax_total, discount_total, grand_total,
            notes, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
        RETURNING id
        "#,
    )
    .bind(row.document_no)
    .bind(row.contact_id)
    .bind(row.quotation_id)
    .bind(row.status)
    .bind(row.expected_date)
    .bind(row.payment_terms)
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
