//! # Sales Process Report
//!
//! Read-only view of everything that grew out of a sales order.
//!
//! ```text
//!              ┌── quotation (if converted)
//!              │
//!  SalesOrder ─┼── purchase order (most recent)
//!              ├── deliveries
//!              └── invoices ──► total_value, profit,
//!                               amount_invoiced, amount_paid
//! ```
//!
//! Figures are recomputed on every call; nothing here is stored.

use tracing::debug;

use meridian_core::document::SalesProcess;

use crate::context::RequestContext;
use crate::error::DbResult;
use crate::pool::Database;

/// Builds [`SalesProcess`] aggregates.
#[derive(Debug, Clone)]
pub struct SalesProcessReport {
    db: Database,
}

impl SalesProcessReport {
    pub fn new(db: Database) -> Self {
        SalesProcessReport { db }
    }

    /// Assembles the process around one sales order.
    ///
    /// `NotFound` if the sales order does not exist.
    pub async fn for_sales_order(&self, ctx: &RequestContext, sales_order_id: i64) -> DbResult<SalesProcess> {
        let order = self.db.sales_orders().get_by_id(ctx, sales_order_id).await?;

        let quotation = match order.quotation_id {
            Some(id) => Some(self.db.quotations().get_by_id(ctx, id).await?),
            None => None,
        };
        let purchase_order = self
            .db
            .purchase_orders()
            .get_by_sales_order(ctx, sales_order_id)
            .await?
            .into_iter()
            .next();
        let deliveries = self.db.deliveries().get_by_sales_order(ctx, sales_order_id).await?;
        let invoices = self.db.invoices().get_by_sales_order(ctx, sales_order_id).await?;

        debug!(
            sales_order_id,
            has_quotation = quotation.is_some(),
            has_purchase_order = purchase_order.is_some(),
            deliveries = deliveries.len(),
            invoices = invoices.len(),
            "Assembled sales process"
        );

        Ok(SalesProcess::assemble(
            quotation,
            order,
            purchase_order,
            deliveries,
            invoices,
        ))
    }

    /// Every sales process for a contact, most recent sales order first.
    pub async fn for_contact(&self, ctx: &RequestContext, contact_id: i64) -> DbResult<Vec<SalesProcess>> {
        let ids: Vec<i64> = ctx
            .run(async {
                let ids = sqlx::query_scalar(
                    "SELECT id FROM sales_orders WHERE contact_id = ?1 ORDER BY created_at DESC, id DESC",
                )
                .bind(contact_id)
                .fetch_all(self.db.pool())
                .await?;
                Ok(ids)
            })
            .await?;

        let mut processes = Vec::with_capacity(ids.len());
        for id in ids {
            processes.push(self.for_sales_order(ctx, id).await?);
        }
        Ok(processes)
    }
}
