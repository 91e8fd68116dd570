//! # Delivery Repository
//!
//! Shipments against a sales order.
//!
//! ```text
//! pending ──► shipped ──► delivered
//!                │            │
//!                └──► returned ◄┘
//! ```

use tracing::info;

use meridian_core::document::{Delivery, NewDelivery, SalesOrder};
use meridian_core::status::DeliveryStatus;
use meridian_core::totals::DocumentTotals;
use meridian_core::types::{DocumentKind, LineItem};

use crate::context::RequestContext;
use crate::error::DbResult;
use crate::repository::common::{
    delete_items, ensure_exists, ensure_initial, fetch_by_column, insert_items, lock_row,
    next_status, now, parent_document_no, prepare_document, require_document,
    validate_optional_text, with_document_number, DocTable, DocumentRecord,
};
use crate::repository::document::DocumentRepository;

pub type DeliveryRepository = DocumentRepository<Delivery>;

impl DocumentRecord for Delivery {
    const TABLE: DocTable = DocTable {
        kind: DocumentKind::Delivery,
        table: "deliveries",
        items_table: "delivery_items",
        parent_column: "delivery_id",
        dependents: &[],
    };
}

impl DocumentRepository<Delivery> {
    /// Creates a delivery in `pending`.
    pub async fn create(&self, ctx: &RequestContext, input: &NewDelivery) -> DbResult<Delivery> {
        ctx.ensure_live()?;
        let status = ensure_initial(input.status)?;
        validate_optional_text("tracking_number", &input.tracking_number)?;
        parent_document_no(&self.pool, SalesOrder::TABLE, input.sales_order_id).await?;

        let lines = prepare_document(&self.pool, input.contact_id, &input.notes, &input.items).await?;
        let totals = DocumentTotals::compute(&lines);
        let lines = &lines;

        let id = with_document_number(
            &self.pool,
            ctx,
            self.settings,
            DocumentKind::Delivery,
            input.document_no.as_deref(),
            move |number| self.insert_once(ctx, input, status, lines, totals, number),
        )
        .await?;

        self.get_by_id(ctx, id).await
    }

    async fn insert_once(
        &self,
        ctx: &RequestContext,
        input: &NewDelivery,
        status: DeliveryStatus,
        lines: &[LineItem],
        totals: DocumentTotals,
        document_no: String,
    ) -> DbResult<i64> {
        let (tx, id) = ctx
            .run(async {
                let mut tx = self.pool.begin().await?;
                let stamp = now();

                let id: i64 = sqlx::query_scalar(
                    r#"
                    INSERT INTO deliveries (
                        document_no, contact_id, sales_order_id, status, delivery_date,
                        tracking_number, subtotal, tax_total, discount_total, grand_total,
                        notes, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
                    RETURNING id
                    "#,
                )
                .bind(&document_no)
                .bind(input.contact_id)
                .bind(input.sales_order_id)
                .bind(status)
                .bind(input.delivery_date)
                .bind(&input.tracking_number)
                .bind(totals.subtotal)
                .bind(totals.tax_total)
                .bind(totals.discount_total)
                .bind(totals.grand_total)
                .bind(&input.notes)
                .bind(stamp)
                .fetch_one(&mut *tx)
                .await?;

                insert_items(&mut *tx, Delivery::TABLE, id, lines).await?;
                Ok((tx, id))
            })
            .await?;
        ctx.commit(tx).await?;

        info!(id, document_no = %document_no, "Created delivery");
        Ok(id)
    }

    pub async fn update(&self, ctx: &RequestContext, id: i64, input: &NewDelivery) -> DbResult<Delivery> {
        ctx.ensure_live()?;
        ensure_exists(&self.pool, Delivery::TABLE, id).await?;
        validate_optional_text("tracking_number", &input.tracking_number)?;
        parent_document_no(&self.pool, SalesOrder::TABLE, input.sales_order_id).await?;

        let lines = prepare_document(&self.pool, input.contact_id, &input.notes, &input.items).await?;
        let totals = DocumentTotals::compute(&lines);

        let (tx, updated) = ctx
            .run(async {
                let mut tx = self.pool.begin().await?;
                lock_row(&mut *tx, Delivery::TABLE, id).await?;

                let current = require_document::<Delivery>(&mut *tx, id).await?;
                let status = next_status(current.status, input.status)?;

                sqlx::query(
                    r#"
                    UPDATE deliveries SET
                        contact_id = ?1, sales_order_id = ?2, status = ?3, delivery_date = ?4,
                        tracking_number = ?5, subtotal = ?6, tax_total = ?7, discount_total = ?8,
                        grand_total = ?9, notes = ?10, updated_at = ?11
                    WHERE id = ?12
                    "#,
                )
                .bind(input.contact_id)
                .bind(input.sales_order_id)
                .bind(status)
                .bind(input.delivery_date)
                .bind(&input.tracking_number)
                .bind(totals.subtotal)
                .bind(totals.tax_total)
                .bind(totals.discount_total)
                .bind(totals.grand_total)
                .bind(&input.notes)
                .bind(now())
                .bind(id)
                .execute(&mut *tx)
                .await?;

                delete_items(&mut *tx, Delivery::TABLE, id).await?;
                insert_items(&mut *tx, Delivery::TABLE, id, &lines).await?;

                let updated = require_document::<Delivery>(&mut *tx, id).await?;
                Ok((tx, updated))
            })
            .await?;
        ctx.commit(tx).await?;

        info!(id, status = %updated.status, "Updated delivery");
        Ok(updated)
    }

    /// Deliveries for a sales order, most recent first.
    pub async fn get_by_sales_order(&self, ctx: &RequestContext, sales_order_id: i64) -> DbResult<Vec<Delivery>> {
        ctx.run(async {
            let mut conn = self.pool.acquire().await?;
            fetch_by_column::<Delivery>(&mut *conn, "sales_order_id", sales_order_id).await
        })
        .await
    }
}
