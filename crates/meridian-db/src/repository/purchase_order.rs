//! # Purchase Order Repository
//!
//! Purchase orders buy in what a sales order sold. When linked to a sales
//! order they freeze its number in `so_no` so the link stays readable.

use tracing::info;

use meridian_core::document::{NewPurchaseOrder, PurchaseOrder, SalesOrder};
use meridian_core::status::PurchaseOrderStatus;
use meridian_core::totals::DocumentTotals;
use meridian_core::types::DocumentKind;

use crate::context::RequestContext;
use crate::error::DbResult;
use crate::repository::common::{
    delete_items, ensure_exists, ensure_initial, fetch_by_column, insert_items, lock_row,
    next_status, now, parent_document_no, prepare_document, require_document,
    validate_optional_text, with_document_number, DocTable, DocumentRecord,
};
use crate::repository::document::DocumentRepository;

pub type PurchaseOrderRepository = DocumentRepository<PurchaseOrder>;

impl DocumentRecord for PurchaseOrder {
    const TABLE: DocTable = DocTable {
        kind: DocumentKind::PurchaseOrder,
        table: "purchase_orders",
        items_table: "purchase_order_items",
        parent_column: "purchase_order_id",
        dependents: &[],
    };
}

impl DocumentRepository<PurchaseOrder> {
    /// Creates a purchase order in `draft`.
    ///
    /// When `sales_order_id` is set and `so_no` is not, the sales order's
    /// current number is copied in.
    pub async fn create(&self, ctx: &RequestContext, input: &NewPurchaseOrder) -> DbResult<PurchaseOrder> {
        ctx.ensure_live()?;
        let status = ensure_initial(input.status)?;
        validate_optional_text("payment_terms", &input.payment_terms)?;
        let parent_no = parent_document_no(&self.pool, SalesOrder::TABLE, input.sales_order_id).await?;
        let so_no = input.so_no.clone().or(parent_no);

        let lines = prepare_document(&self.pool, input.contact_id, &input.notes, &input.items).await?;
        let totals = DocumentTotals::compute(&lines);
        let lines = &lines;
        let so_no = so_no.as_deref();

        let id = with_document_number(
            &self.pool,
            ctx,
            self.settings,
            DocumentKind::PurchaseOrder,
            input.document_no.as_deref(),
            move |number| async move {
                let (tx, id) = ctx
                    .run(async {
                        let mut tx = self.pool.begin().await?;
                        let id = insert_purchase_order_row(
                            &mut *tx,
                            &PurchaseOrderRow {
                                document_no: &number,
                                contact_id: input.contact_id,
                                sales_order_id: input.sales_order_id,
                                so_no,
                                status,
                                expected_date: input.expected_date,
                                payment_terms: input.payment_terms.as_deref(),
                                notes: input.notes.as_deref(),
                                totals,
                            },
                        )
                        .await?;
                        insert_items(&mut *tx, PurchaseOrder::TABLE, id, lines).await?;
                        Ok((tx, id))
                    })
                    .await?;
                ctx.commit(tx).await?;

                info!(id, document_no = %number, grand_total = %totals.grand_total, "Created purchase order");
                Ok(id)
            },
        )
        .await?;

        self.get_by_id(ctx, id).await
    }

    /// Replaces header fields and items; totals are recomputed.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: i64,
        input: &NewPurchaseOrder,
    ) -> DbResult<PurchaseOrder> {
        ctx.ensure_live()?;
        ensure_exists(&self.pool, PurchaseOrder::TABLE, id).await?;
        validate_optional_text("payment_terms", &input.payment_terms)?;
        let parent_no = parent_document_no(&self.pool, SalesOrder::TABLE, input.sales_order_id).await?;
        let so_no = input.so_no.clone().or(parent_no);

        let lines = prepare_document(&self.pool, input.contact_id, &input.notes, &input.items).await?;
        let totals = DocumentTotals::compute(&lines);

        let (tx, updated) = ctx
            .run(async {
                let mut tx = self.pool.begin().await?;
                lock_row(&mut *tx, PurchaseOrder::TABLE, id).await?;

                let current = require_document::<PurchaseOrder>(&mut *tx, id).await?;
                let status = next_status(current.status, input.status)?;

                sqlx::query(
                    r#"
                    UPDATE purchase_orders SET
                        contact_id = ?1, sales_order_id = ?2, so_no = ?3, status = ?4,
                        expected_date = ?5, payment_terms = ?6, subtotal = ?7, tax_total = ?8,
                        discount_total = ?9, grand_total = ?10, notes = ?11, updated_at = ?12
                    WHERE id = ?13
                    "#,
                )
                .bind(input.contact_id)
                .bind(input.sales_order_id)
                .bind(&so_no)
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

                delete_items(&mut *tx, PurchaseOrder::TABLE, id).await?;
                insert_items(&mut *tx, PurchaseOrder::TABLE, id, &lines).await?;

                let updated = require_document::<PurchaseOrder>(&mut *tx, id).await?;
                Ok((tx, updated))
            })
            .await?;
        ctx.commit(tx).await?;

        info!(id, status = %updated.status, "Updated purchase order");
        Ok(updated)
    }

    /// Purchase orders raised against a sales order, most recent first.
    pub async fn get_by_sales_order(&self, ctx: &RequestContext, sales_order_id: i64) -> DbResult<Vec<PurchaseOrder>> {
        ctx.run(async {
            let mut conn = self.pool.acquire().await?;
            fetch_by_column::<PurchaseOrder>(&mut *conn, "sales_order_id", sales_order_id).await
        })
        .await
    }
}

pub(crate) struct PurchaseOrderRow<'a> {
    pub document_no: &'a str,
    pub contact_id: i64,
    pub sales_order_id: Option<i64>,
    pub so_no: Option<&'a str>,
    pub status: PurchaseOrderStatus,
    pub expected_date: Option<chrono::NaiveDate>,
    pub payment_terms: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub totals: DocumentTotals,
}

pub(crate) async fn insert_purchase_order_row(
    conn: &mut sqlx::SqliteConnection,
    row: &PurchaseOrderRow<'_>,
) -> DbResult<i64> {
    let stamp = now();
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO purchase_orders (
            document_no, contact_id, sales_order_id, so_no, status, expected_date,
            payment_terms, subtotal, tax_total, discount_total, grand_total,
            notes, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
        RETURNING id
        "#,
    )
    .bind(row.document_no)
    .bind(row.contact_id)
    .bind(row.sales_order_id)
    .bind(row.so_no)
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
