//! # Conversion Engine
//!
//! Turns one committed document into the next document of the chain.
//!
//! ## Conversions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Quotation (accepted) ──► SalesOrder (confirmed, quotation_id)         │
//! │                                                                         │
//! │  SalesOrder (not cancelled) ──► PurchaseOrder (draft, sales_order_id,  │
//! │                                                so_no)                   │
//! │                                                                         │
//! │  SalesOrder (not draft/cancelled) ──► Invoice (draft, sales_order_id)  │
//! │                                                                         │
//! │  Every conversion:                                                      │
//! │  1. loads the source and checks status + items (no transaction)        │
//! │  2. allocates the target number                                        │
//! │  3. BEGIN, locks the source row, re-reads and re-checks it             │
//! │  4. inserts the target header and copies the items verbatim            │
//! │  5. COMMIT; the source document is left as it was                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Items are copied with their stored totals; they are not recomputed.
//! Converting the same quotation twice is not blocked here, see
//! [`SalesOrderRepository::get_by_quotation`](crate::repository::sales_order::SalesOrderRepository).

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::info;

use meridian_core::document::{Invoice, PurchaseOrder, Quotation, SalesDocument, SalesOrder};
use meridian_core::status::{InvoiceStatus, PurchaseOrderStatus, SalesOrderStatus};
use meridian_core::types::DocumentKind;
use meridian_core::{CoreError, ValidationError};

use crate::context::RequestContext;
use crate::error::DbResult;
use crate::repository::common::{
    insert_items, lock_row, require_document, with_document_number, DocumentRecord, RepoSettings,
};
use crate::repository::invoice::{insert_invoice_row, InvoiceRow};
use crate::repository::purchase_order::{insert_purchase_order_row, PurchaseOrderRow};
use crate::repository::sales_order::{insert_sales_order_row, SalesOrderRow};

/// Status text used in errors for a refused conversion.
const CONVERTED: &str = "converted";

/// Document-to-document conversions.
#[derive(Debug, Clone)]
pub struct ConversionEngine {
    pool: SqlitePool,
    settings: RepoSettings,
}

impl ConversionEngine {
    pub fn new(pool: SqlitePool, settings: RepoSettings) -> Self {
        ConversionEngine { pool, settings }
    }

    // =========================================================================
    // Quotation → Sales Order
    // =========================================================================

    /// Creates a `confirmed` sales order from an accepted quotation.
    ///
    /// Contact, totals and notes are copied, the quotation's terms become
    /// the order's payment terms, and every item is copied as stored.
    ///
    /// ## Errors
    /// - `NotFound` if the quotation does not exist
    /// - `InvalidStatusTransition` unless the quotation is `accepted`
    /// - `Validation(NoLineItems)` if the quotation has no items
    pub async fn convert_quotation_to_sales_order(
        &self,
        ctx: &RequestContext,
        quotation_id: i64,
    ) -> DbResult<SalesOrder> {
        ctx.ensure_live()?;
        let quotation = self.load::<Quotation>(ctx, quotation_id).await?;
        check_quotation(&quotation)?;

        let id = with_document_number(
            &self.pool,
            ctx,
            self.settings,
            DocumentKind::SalesOrder,
            None,
            move |number| self.quotation_to_sales_order(ctx, quotation_id, number),
        )
        .await?;

        let order = self.load::<SalesOrder>(ctx, id).await?;
        info!(
            quotation = %quotation.document_no,
            sales_order = %order.document_no,
            grand_total = %order.grand_total,
            "Converted quotation to sales order"
        );
        Ok(order)
    }

    async fn quotation_to_sales_order(
        &self,
        ctx: &RequestContext,
        quotation_id: i64,
        document_no: String,
    ) -> DbResult<i64> {
        let (tx, id) = ctx
            .run(async {
                let mut tx = self.pool.begin().await?;
                lock_row(&mut *tx, Quotation::TABLE, quotation_id).await?;

                let quotation = require_document::<Quotation>(&mut *tx, quotation_id).await?;
                check_quotation(&quotation)?;

                let id = insert_sales_order_row(
                    &mut *tx,
                    &SalesOrderRow {
                        document_no: &document_no,
                        contact_id: quotation.contact_id,
                        quotation_id: Some(quotation.id),
                        status: SalesOrderStatus::Confirmed,
                        expected_date: None,
                        payment_terms: quotation.terms.as_deref(),
                        notes: quotation.notes.as_deref(),
                        totals: quotation.totals(),
                    },
                )
                .await?;
                insert_items(&mut *tx, SalesOrder::TABLE, id, &quotation.items).await?;
                Ok((tx, id))
            })
            .await?;
        ctx.commit(tx).await?;

        Ok(id)
    }

    // =========================================================================
    // Sales Order → Purchase Order
    // =========================================================================

    /// Creates a `draft` purchase order from a sales order.
    ///
    /// Copies contact, totals, notes, payment terms, expected date and items;
    /// links back through `sales_order_id` and `so_no`.
    pub async fn create_purchase_order_from_sales_order(
        &self,
        ctx: &RequestContext,
        sales_order_id: i64,
    ) -> DbResult<PurchaseOrder> {
        ctx.ensure_live()?;
        let order = self.load::<SalesOrder>(ctx, sales_order_id).await?;
        check_for_purchase_order(&order)?;

        let id = with_document_number(
            &self.pool,
            ctx,
            self.settings,
            DocumentKind::PurchaseOrder,
            None,
            move |number| self.sales_order_to_purchase_order(ctx, sales_order_id, number),
        )
        .await?;

        let po = self.load::<PurchaseOrder>(ctx, id).await?;
        info!(
            sales_order = %order.document_no,
            purchase_order = %po.document_no,
            "Created purchase order from sales order"
        );
        Ok(po)
    }

    async fn sales_order_to_purchase_order(
        &self,
        ctx: &RequestContext,
        sales_order_id: i64,
        document_no: String,
    ) -> DbResult<i64> {
        let (tx, id) = ctx
            .run(async {
                let mut tx = self.pool.begin().await?;
                lock_row(&mut *tx, SalesOrder::TABLE, sales_order_id).await?;

                let order = require_document::<SalesOrder>(&mut *tx, sales_order_id).await?;
                check_for_purchase_order(&order)?;

                let id = insert_purchase_order_row(
                    &mut *tx,
                    &PurchaseOrderRow {
                        document_no: &document_no,
                        contact_id: order.contact_id,
                        sales_order_id: Some(order.id),
                        so_no: Some(&order.document_no),
                        status: PurchaseOrderStatus::Draft,
                        expected_date: order.expected_date,
                        payment_terms: order.payment_terms.as_deref(),
                        notes: order.notes.as_deref(),
                        totals: order.totals(),
                    },
                )
                .await?;
                insert_items(&mut *tx, PurchaseOrder::TABLE, id, &order.items).await?;
                Ok((tx, id))
            })
            .await?;
        ctx.commit(tx).await?;

        Ok(id)
    }

    // =========================================================================
    // Sales Order → Invoice
    // =========================================================================

    /// Creates a `draft` invoice billing a sales order in full.
    pub async fn create_invoice_from_sales_order(
        &self,
        ctx: &RequestContext,
        sales_order_id: i64,
        due_date: Option<NaiveDate>,
    ) -> DbResult<Invoice> {
        ctx.ensure_live()?;
        let order = self.load::<SalesOrder>(ctx, sales_order_id).await?;
        check_for_invoice(&order)?;

        let id = with_document_number(
            &self.pool,
            ctx,
            self.settings,
            DocumentKind::Invoice,
            None,
            move |number| self.sales_order_to_invoice(ctx, sales_order_id, due_date, number),
        )
        .await?;

        let invoice = self.load::<Invoice>(ctx, id).await?;
        info!(
            sales_order = %order.document_no,
            invoice = %invoice.document_no,
            grand_total = %invoice.grand_total,
            "Created invoice from sales order"
        );
        Ok(invoice)
    }

    async fn sales_order_to_invoice(
        &self,
        ctx: &RequestContext,
        sales_order_id: i64,
        due_date: Option<NaiveDate>,
        document_no: String,
    ) -> DbResult<i64> {
        let (tx, id) = ctx
            .run(async {
                let mut tx = self.pool.begin().await?;
                lock_row(&mut *tx, SalesOrder::TABLE, sales_order_id).await?;

                let order = require_document::<SalesOrder>(&mut *tx, sales_order_id).await?;
                check_for_invoice(&order)?;

                let id = insert_invoice_row(
                    &mut *tx,
                    &InvoiceRow {
                        document_no: &document_no,
                        contact_id: order.contact_id,
                        sales_order_id: Some(order.id),
                        status: InvoiceStatus::Draft,
                        due_date,
                        notes: order.notes.as_deref(),
                        totals: order.totals(),
                    },
                )
                .await?;
                insert_items(&mut *tx, Invoice::TABLE, id, &order.items).await?;
                Ok((tx, id))
            })
            .await?;
        ctx.commit(tx).await?;

        Ok(id)
    }

    async fn load<D: DocumentRecord>(&self, ctx: &RequestContext, id: i64) -> DbResult<D> {
        ctx.run(async {
            let mut conn = self.pool.acquire().await?;
            require_document::<D>(&mut *conn, id).await
        })
        .await
    }
}

// =============================================================================
// Source checks (run before and again inside the transaction)
// =============================================================================

fn check_quotation(quotation: &Quotation) -> DbResult<()> {
    if !quotation.status.is_convertible() {
        return Err(CoreError::invalid_transition(DocumentKind::Quotation, quotation.status, CONVERTED).into());
    }
    ensure_has_items(quotation)
}

fn check_for_purchase_order(order: &SalesOrder) -> DbResult<()> {
    if order.status == SalesOrderStatus::Cancelled {
        return Err(CoreError::invalid_transition(DocumentKind::SalesOrder, order.status, CONVERTED).into());
    }
    ensure_has_items(order)
}

fn check_for_invoice(order: &SalesOrder) -> DbResult<()> {
    if matches!(order.status, SalesOrderStatus::Draft | SalesOrderStatus::Cancelled) {
        return Err(CoreError::invalid_transition(DocumentKind::SalesOrder, order.status, CONVERTED).into());
    }
    ensure_has_items(order)
}

fn ensure_has_items<D: SalesDocument>(doc: &D) -> DbResult<()> {
    if doc.items().is_empty() {
        return Err(ValidationError::NoLineItems {
            document: doc.kind(),
            id: doc.id(),
        }
        .into());
    }
    Ok(())
}
