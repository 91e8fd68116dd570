//! # Document Repository
//!
//! Read, delete and status operations shared by all five line-item documents.
//! Each document type adds its own `create`/`update` in its module.
//!
//! ## Read Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  get_all ──────┐                                                        │
//! │  get_by_status ┤                                                        │
//! │  get_by_contact┼──► list(ctx, DocumentFilter, PaginationParams)        │
//! │  get_by_period ┤        │                                               │
//! │  search ───────┘        ├── params.validate()   (no query on failure)  │
//! │                         ├── SELECT COUNT(*) ... WHERE <filters>        │
//! │                         ├── SELECT * ... ORDER BY created_at DESC      │
//! │                         │            LIMIT ? OFFSET ?                   │
//! │                         └── items + contact per row                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::marker::PhantomData;
use tracing::info;

use meridian_core::document::{DocumentFilter, SalesDocument};
use meridian_core::pagination::{PagedResult, PaginationParams};
use meridian_core::status::transition;

use crate::context::RequestContext;
use crate::error::DbResult;
use crate::repository::common::{
    delete_items, delete_row, ensure_no_dependents, list_documents, lock_row, now,
    require_document, DocumentRecord, RepoSettings,
};

/// Repository for one document type.
///
/// Cheap to clone; holds a pool handle and the engine settings.
#[derive(Debug)]
pub struct DocumentRepository<D> {
    pub(crate) pool: SqlitePool,
    pub(crate) settings: RepoSettings,
    _marker: PhantomData<fn() -> D>,
}

impl<D> Clone for DocumentRepository<D> {
    fn clone(&self) -> Self {
        DocumentRepository {
            pool: self.pool.clone(),
            settings: self.settings,
            _marker: PhantomData,
        }
    }
}

#[allow(private_bounds)]
impl<D: DocumentRecord> DocumentRepository<D> {
    pub fn new(pool: SqlitePool, settings: RepoSettings) -> Self {
        DocumentRepository {
            pool,
            settings,
            _marker: PhantomData,
        }
    }

    /// Gets a document with its items and contact; `NotFound` if absent.
    pub async fn get_by_id(&self, ctx: &RequestContext, id: i64) -> DbResult<D> {
        ctx.run(async {
            let mut conn = self.pool.acquire().await?;
            require_document::<D>(&mut *conn, id).await
        })
        .await
    }

    /// Filtered, paginated listing, newest first.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        filter: &DocumentFilter<D::Status>,
        params: PaginationParams,
    ) -> DbResult<PagedResult<D>> {
        list_documents::<D, D::Status>(&self.pool, ctx, self.settings, filter, params).await
    }

    pub async fn get_all(&self, ctx: &RequestContext, params: PaginationParams) -> DbResult<PagedResult<D>> {
        self.list(ctx, &DocumentFilter::all(), params).await
    }

    pub async fn get_by_status(
        &self,
        ctx: &RequestContext,
        status: D::Status,
        params: PaginationParams,
    ) -> DbResult<PagedResult<D>> {
        self.list(ctx, &DocumentFilter::all().with_status(status), params).await
    }

    pub async fn get_by_contact(
        &self,
        ctx: &RequestContext,
        contact_id: i64,
        params: PaginationParams,
    ) -> DbResult<PagedResult<D>> {
        self.list(ctx, &DocumentFilter::all().with_contact(contact_id), params).await
    }

    /// Documents created in `[from, to)`.
    pub async fn get_by_period(
        &self,
        ctx: &RequestContext,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        params: PaginationParams,
    ) -> DbResult<PagedResult<D>> {
        self.list(ctx, &DocumentFilter::all().with_period(from, to), params).await
    }

    /// Matches document number, notes and contact name.
    pub async fn search(
        &self,
        ctx: &RequestContext,
        query: &str,
        params: PaginationParams,
    ) -> DbResult<PagedResult<D>> {
        self.list(ctx, &DocumentFilter::all().with_search(query), params).await
    }

    /// Deletes a document and its items.
    ///
    /// Fails with `RelatedRecordsExist` while other documents reference it.
    pub async fn delete(&self, ctx: &RequestContext, id: i64) -> DbResult<()> {
        let table = D::TABLE;
        ctx.ensure_live()?;

        let (tx, items) = ctx
            .run(async {
                let mut tx = self.pool.begin().await?;
                lock_row(&mut *tx, table, id).await?;
                ensure_no_dependents(&mut *tx, table, id).await?;

                let items = delete_items(&mut *tx, table, id).await?;
                delete_row(&mut *tx, table, id).await?;
                Ok((tx, items))
            })
            .await?;
        ctx.commit(tx).await?;

        info!(kind = %table.kind, id, items, "Deleted document");
        Ok(())
    }

    /// Moves a document to `status` if its transition table allows it.
    pub async fn update_status(&self, ctx: &RequestContext, id: i64, status: D::Status) -> DbResult<D> {
        let table = D::TABLE;
        ctx.ensure_live()?;

        let (tx, previous, updated) = ctx
            .run(async {
                let mut tx = self.pool.begin().await?;
                lock_row(&mut *tx, table, id).await?;

                let current = require_document::<D>(&mut *tx, id).await?;
                let next = transition(current.status(), status)?;

                let sql = format!(
                    "UPDATE {} SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    table.table
                );
                sqlx::query(&sql)
                    .bind(next.to_string())
                    .bind(now())
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;

                let updated = require_document::<D>(&mut *tx, id).await?;
                Ok((tx, current.status(), updated))
            })
            .await?;
        ctx.commit(tx).await?;

        info!(kind = %table.kind, id, from = %previous, to = %updated.status(), "Status changed");
        Ok(updated)
    }

    pub async fn count(&self, ctx: &RequestContext) -> DbResult<i64> {
        ctx.run(async {
            let sql = format!("SELECT COUNT(*) FROM {}", D::TABLE.table);
            let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
            Ok(count)
        })
        .await
    }

    /// Backdates a document so period filters can be exercised.
    #[cfg(any(test, feature = "testing"))]
    pub async fn set_created_at_for_testing(
        &self,
        ctx: &RequestContext,
        id: i64,
        created_at: DateTime<Utc>,
    ) -> DbResult<()> {
        ctx.ensure_live()?;
        let table = D::TABLE;
        let sql = format!("UPDATE {} SET created_at = ?1 WHERE id = ?2", table.table);
        let result = sqlx::query(&sql)
            .bind(created_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(crate::error::DbError::not_found(table.kind.to_string(), id));
        }
        tracing::debug!(kind = %table.kind, id, %created_at, "Backdated document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use meridian_core::document::NewQuotation;
    use meridian_core::types::NewContact;
    use meridian_core::pagination::PaginationParams;

    use crate::context::RequestContext;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_period_filter_uses_created_at() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ctx = RequestContext::background();
        let contact = db.contacts().insert(&NewContact::named("Acme")).await.unwrap();
        let input = NewQuotation {
            contact_id: contact.id,
            ..Default::default()
        };

        let old = db.quotations().create(&ctx, &input).await.unwrap();
        let recent = db.quotations().create(&ctx, &input).await.unwrap();

        let now = Utc::now();
        db.quotations()
            .set_created_at_for_testing(&ctx, old.id, now - Duration::days(40))
            .await
            .unwrap();

        let params = PaginationParams::default();
        let last_month = db
            .quotations()
            .get_by_period(&ctx, now - Duration::days(30), now + Duration::days(1), params)
            .await
            .unwrap();
        assert_eq!(last_month.items.iter().map(|q| q.id).collect::<Vec<_>>(), vec![recent.id]);

        // upper bound is exclusive
        let earlier = db
            .quotations()
            .get_by_period(&ctx, now - Duration::days(50), now - Duration::days(40), params)
            .await
            .unwrap();
        assert_eq!(earlier.total_items, 0);

        let window = db
            .quotations()
            .get_by_period(&ctx, now - Duration::days(41), now - Duration::days(39), params)
            .await
            .unwrap();
        assert_eq!(window.items.iter().map(|q| q.id).collect::<Vec<_>>(), vec![old.id]);
    }

    #[tokio::test]
    async fn test_backdating_missing_document_is_not_found() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ctx = RequestContext::background();

        let err = db
            .invoices()
            .set_created_at_for_testing(&ctx, 99, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::DbError::NotFound { .. }));
    }
}
