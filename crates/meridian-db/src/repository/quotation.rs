//! # Quotation Repository
//!
//! Quotations open the sales chain. Once `accepted` they can be converted
//! into a sales order (see [`crate::conversion`]).
//!
//! ```text
//! draft ──► sent ──┬──► accepted ──► (convert)
//!                  ├──► rejected
//!                  ├──► cancelled
//!                  └──► expired     (expire_overdue sweep only)
//! ```

use chrono::NaiveDate;
use tracing::info;

use meridian_core::document::{NewQuotation, Quotation};
use meridian_core::status::QuotationStatus;
use meridian_core::totals::DocumentTotals;
use meridian_core::types::{DocumentKind, LineItem};

use crate::context::RequestContext;
use crate::error::DbResult;
use crate::repository::common::{
    delete_items, ensure_exists, ensure_initial, insert_items, lock_row, next_status, now,
    prepare_document, require_document, validate_optional_text, with_document_number, Dependent,
    DocTable, DocumentRecord,
};
use crate::repository::document::DocumentRepository;

pub type QuotationRepository = DocumentRepository<Quotation>;

impl DocumentRecord for Quotation {
    const TABLE: DocTable = DocTable {
        kind: DocumentKind::Quotation,
        table: "quotations",
        items_table: "quotation_items",
        parent_column: "quotation_id",
        dependents: &[Dependent {
            kind: DocumentKind::SalesOrder,
            table: "sales_orders",
            column: "quotation_id",
        }],
    };
}

impl DocumentRepository<Quotation> {
    /// Creates a quotation in `draft` with a generated (or supplied) number.
    ///
    /// ## Steps
    /// 1. Validate contact, notes, terms and lines (no transaction yet)
    /// 2. Compute totals from the lines
    /// 3. Allocate `QT-<year>-<seq>` and insert row + items in one transaction
    /// 4. Reload with items and contact
    pub async fn create(&self, ctx: &RequestContext, input: &NewQuotation) -> DbResult<Quotation> {
        ctx.ensure_live()?;
        let status = ensure_initial(input.status)?;
        validate_optional_text("terms", &input.terms)?;

        let lines = prepare_document(&self.pool, input.contact_id, &input.notes, &input.items).await?;
        let totals = DocumentTotals::compute(&lines);
        let lines = &lines;

        let id = with_document_number(
            &self.pool,
            ctx,
            self.settings,
            DocumentKind::Quotation,
            input.document_no.as_deref(),
            move |number| self.insert_once(ctx, input, status, lines, totals, number),
        )
        .await?;

        self.get_by_id(ctx, id).await
    }

    async fn insert_once(
        &self,
        ctx: &RequestContext,
        input: &NewQuotation,
        status: QuotationStatus,
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
                    INSERT INTO quotations (
                        document_no, contact_id, status, expiry_date, terms,
                        subtotal, tax_total, discount_total, grand_total,
                        notes, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
                    RETURNING id
                    "#,
                )
                .bind(&document_no)
                .bind(input.contact_id)
                .bind(status)
                .bind(input.expiry_date)
                .bind(&input.terms)
                .bind(totals.subtotal)
                .bind(totals.tax_total)
                .bind(totals.discount_total)
                .bind(totals.grand_total)
                .bind(&input.notes)
                .bind(stamp)
                .fetch_one(&mut *tx)
                .await?;

                insert_items(&mut *tx, Quotation::TABLE, id, lines).await?;
                Ok((tx, id))
            })
            .await?;
        ctx.commit(tx).await?;

        info!(id, document_no = %document_no, grand_total = %totals.grand_total, "Created quotation");
        Ok(id)
    }

    /// Replaces header fields and the full item set; totals are recomputed.
    ///
    /// `document_no` is never changed by an update. A requested status goes
    /// through the transition table.
    pub async fn update(&self, ctx: &RequestContext, id: i64, input: &NewQuotation) -> DbResult<Quotation> {
        ctx.ensure_live()?;
        ensure_exists(&self.pool, Quotation::TABLE, id).await?;
        validate_optional_text("terms", &input.terms)?;

        let lines = prepare_document(&self.pool, input.contact_id, &input.notes, &input.items).await?;
        let totals = DocumentTotals::compute(&lines);

        let (tx, updated) = ctx
            .run(async {
                let mut tx = self.pool.begin().await?;
                lock_row(&mut *tx, Quotation::TABLE, id).await?;

                let current = require_document::<Quotation>(&mut *tx, id).await?;
                let status = next_status(current.status, input.status)?;

                sqlx::query(
                    r#"
                    UPDATE quotations SET
                        contact_id = ?1, status = ?2, expiry_date = ?3, terms = ?4,
                        subtotal = ?5, tax_total = ?6, discount_total = ?7, grand_total = ?8,
                        notes = ?9, updated_at = ?10
                    WHERE id = ?11
                    "#,
                )
                .bind(input.contact_id)
                .bind(status)
                .bind(input.expiry_date)
                .bind(&input.terms)
                .bind(totals.subtotal)
                .bind(totals.tax_total)
                .bind(totals.discount_total)
                .bind(totals.grand_total)
                .bind(&input.notes)
                .bind(now())
                .bind(id)
                .execute(&mut *tx)
                .await?;

                delete_items(&mut *tx, Quotation::TABLE, id).await?;
                insert_items(&mut *tx, Quotation::TABLE, id, &lines).await?;

                let updated = require_document::<Quotation>(&mut *tx, id).await?;
                Ok((tx, updated))
            })
            .await?;
        ctx.commit(tx).await?;

        info!(id, status = %updated.status, items = lines.len(), "Updated quotation");
        Ok(updated)
    }

    /// Moves every `sent` quotation whose expiry date is before `today` to
    /// `expired`. Returns how many were swept.
    pub async fn expire_overdue(&self, ctx: &RequestContext, today: NaiveDate) -> DbResult<u64> {
        ctx.run(async {
            let result = sqlx::query(
                r#"
                UPDATE quotations SET status = ?1, updated_at = ?2
                WHERE status = ?3 AND expiry_date IS NOT NULL AND expiry_date < ?4
                "#,
            )
            .bind(QuotationStatus::Expired)
            .bind(now())
            .bind(QuotationStatus::Sent)
            .bind(today)
            .execute(&self.pool)
            .await?;

            let swept = result.rows_affected();
            if swept > 0 {
                info!(swept, %today, "Expired overdue quotations");
            }
            Ok(swept)
        })
        .await
    }
}
