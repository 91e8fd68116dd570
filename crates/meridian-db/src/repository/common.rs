//! # Shared Repository Plumbing
//!
//! Table descriptions, line-item persistence, row locking, document-number
//! allocation and the generic paginated query every list method uses.
//!
//! ## Write Ordering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SQLite allows one writer. A transaction that READS first and then     │
//! │  tries to write can lose its snapshot to a concurrent writer and fail  │
//! │  with SQLITE_BUSY instead of waiting. So every multi-step write starts │
//! │  with a write:                                                          │
//! │                                                                         │
//! │    create   → INSERT document row                                      │
//! │    update   → lock_row(): UPDATE .. SET updated_at = updated_at        │
//! │    delete   → lock_row(), then dependent counts                        │
//! │    payment  → INSERT payment row, then re-read the invoice             │
//! │                                                                         │
//! │  Number allocation runs on its own autocommit statement BEFORE the     │
//! │  transaction opens (an in-memory pool has exactly one connection).     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Datelike, DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::fmt::Display;
use std::future::Future;
use tracing::{debug, warn};

use meridian_core::document::{DocumentFilter, SalesDocument};
use meridian_core::numbering::format_document_no;
use meridian_core::pagination::{PagedResult, PaginationParams};
use meridian_core::types::{DocumentKind, LineItem, NewLineItem};
use meridian_core::validation::{validate_line_items, validate_text, MAX_NOTES_LEN};
use meridian_core::status::{transition, DocumentStatus};
use meridian_core::{CoreError, Priced, ValidationError};

use crate::context::RequestContext;
use crate::error::{DbError, DbResult};
use crate::repository::master_data::{fetch_contact, fetch_product};

// =============================================================================
// Settings & table descriptions
// =============================================================================

/// Engine knobs every repository needs.
#[derive(Debug, Clone, Copy)]
pub struct RepoSettings {
    pub max_page_size: i64,
    pub number_retry_limit: u32,
}

/// A table whose rows reference a document and block its deletion.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Dependent {
    pub kind: DocumentKind,
    pub table: &'static str,
    pub column: &'static str,
}

/// Where a document type lives.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DocTable {
    pub kind: DocumentKind,
    pub table: &'static str,
    pub items_table: &'static str,
    /// Parent id column in `items_table`.
    pub parent_column: &'static str,
    pub dependents: &'static [Dependent],
}

/// A document type with a table behind it.
pub(crate) trait DocumentRecord:
    SalesDocument + for<'r> FromRow<'r, SqliteRow> + Send + Unpin + 'static
{
    const TABLE: DocTable;
}

// =============================================================================
// Loading
// =============================================================================

/// Loads a document row plus its items and contact snapshot.
pub(crate) async fn fetch_document<D: DocumentRecord>(
    conn: &mut SqliteConnection,
    id: i64,
) -> DbResult<Option<D>> {
    let sql = format!("SELECT * FROM {} WHERE id = ?1", D::TABLE.table);
    let doc: Option<D> = sqlx::query_as::<_, D>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match doc {
        Some(mut doc) => {
            attach_children(conn, &mut doc).await?;
            Ok(Some(doc))
        }
        None => Ok(None),
    }
}

/// Same as [`fetch_document`] but absent rows are `NotFound`.
pub(crate) async fn require_document<D: DocumentRecord>(
    conn: &mut SqliteConnection,
    id: i64,
) -> DbResult<D> {
    fetch_document::<D>(conn, id)
        .await?
        .ok_or_else(|| DbError::not_found(D::TABLE.kind.to_string(), id))
}

pub(crate) async fn attach_children<D: DocumentRecord>(
    conn: &mut SqliteConnection,
    doc: &mut D,
) -> DbResult<()> {
    let items = load_items(conn, D::TABLE, doc.id()).await?;
    let contact = fetch_contact(conn, doc.contact_id()).await?;
    doc.attach(items, contact);
    Ok(())
}

/// Items in document order.
pub(crate) async fn load_items(
    conn: &mut SqliteConnection,
    table: DocTable,
    document_id: i64,
) -> DbResult<Vec<LineItem>> {
    let sql = format!(
        r#"
        SELECT id, {parent} AS document_id, product_id, product_name, product_code,
               description, quantity, unit_price, discount, tax_rate, total, position
        FROM {items}
        WHERE {parent} = ?1
        ORDER BY position, id
        "#,
        parent = table.parent_column,
        items = table.items_table,
    );
    let items = sqlx::query_as::<_, LineItem>(&sql)
        .bind(document_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(items)
}

/// Loads documents that point at `parent_id` through `column`, newest first.
pub(crate) async fn fetch_by_column<D: DocumentRecord>(
    conn: &mut SqliteConnection,
    column: &str,
    parent_id: i64,
) -> DbResult<Vec<D>> {
    let sql = format!(
        "SELECT * FROM {} WHERE {} = ?1 ORDER BY created_at DESC, id DESC",
        D::TABLE.table,
        column
    );
    let mut docs = sqlx::query_as::<_, D>(&sql)
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await?;
    for doc in docs.iter_mut() {
        attach_children(conn, doc).await?;
    }
    Ok(docs)
}

// =============================================================================
// Line items
// =============================================================================

/// Validates caller lines, fills product snapshots and computes line totals.
///
/// Runs before any transaction opens.
pub(crate) async fn prepare_lines(
    conn: &mut SqliteConnection,
    items: &[NewLineItem],
) -> DbResult<Vec<LineItem>> {
    validate_line_items(items)?;

    let mut prepared = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        let (name, code) = match (&item.product_name, &item.product_code) {
            (Some(name), Some(code)) if !name.trim().is_empty() && !code.trim().is_empty() => {
                (name.clone(), code.clone())
            }
            (name, code) => {
                let product = fetch_product(conn, item.product_id)
                    .await?
                    .ok_or_else(|| ValidationError::unknown_reference("Product", item.product_id))?;
                (
                    name.clone().filter(|n| !n.trim().is_empty()).unwrap_or(product.name),
                    code.clone().filter(|c| !c.trim().is_empty()).unwrap_or(product.code),
                )
            }
        };

        prepared.push(LineItem {
            id: 0,
            document_id: 0,
            product_id: item.product_id,
            product_name: name,
            product_code: code,
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            discount: item.discount,
            tax_rate: item.tax_rate,
            total: item.line_totals().total,
            position: position as i64,
        });
    }
    Ok(prepared)
}

/// Batch-inserts `items` under `document_id`, keeping their stored totals.
pub(crate) async fn insert_items(
    conn: &mut SqliteConnection,
    table: DocTable,
    document_id: i64,
    items: &[LineItem],
) -> DbResult<()> {
    if items.is_empty() {
        return Ok(());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "INSERT INTO {} ({}, product_id, product_name, product_code, description, \
         quantity, unit_price, discount, tax_rate, total, position) ",
        table.items_table, table.parent_column
    ));
    qb.push_values(items.iter().enumerate(), |mut row, (position, item)| {
        row.push_bind(document_id)
            .push_bind(item.product_id)
            .push_bind(item.product_name.clone())
            .push_bind(item.product_code.clone())
            .push_bind(item.description.clone())
            .push_bind(item.quantity)
            .push_bind(item.unit_price)
            .push_bind(item.discount)
            .push_bind(item.tax_rate)
            .push_bind(item.total)
            .push_bind(position as i64);
    });
    qb.build().execute(&mut *conn).await?;

    debug!(table = table.items_table, document_id, count = items.len(), "Inserted line items");
    Ok(())
}

pub(crate) async fn delete_items(
    conn: &mut SqliteConnection,
    table: DocTable,
    document_id: i64,
) -> DbResult<u64> {
    let sql = format!(
        "DELETE FROM {} WHERE {} = ?1",
        table.items_table, table.parent_column
    );
    let result = sqlx::query(&sql).bind(document_id).execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

// =============================================================================
// Locking & deletion
// =============================================================================

/// Takes SQLite's write lock and proves the row exists.
///
/// A no-op UPDATE, so it must be the first statement of the transaction.
pub(crate) async fn lock_row(conn: &mut SqliteConnection, table: DocTable, id: i64) -> DbResult<()> {
    let sql = format!(
        "UPDATE {} SET updated_at = updated_at WHERE id = ?1",
        table.table
    );
    let result = sqlx::query(&sql).bind(id).execute(&mut *conn).await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found(table.kind.to_string(), id));
    }
    Ok(())
}

/// Fails with `NotFound` unless the document row exists.
///
/// Updates call this before validating their input so a missing id is
/// reported as such. The row is locked again inside the transaction.
pub(crate) async fn ensure_exists(pool: &SqlitePool, table: DocTable, id: i64) -> DbResult<()> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table.table);
    let exists: bool = sqlx::query_scalar(&sql).bind(id).fetch_one(pool).await?;
    if !exists {
        return Err(DbError::not_found(table.kind.to_string(), id));
    }
    Ok(())
}

/// Fails with `RelatedRecordsExist` on the first dependent table with rows.
pub(crate) async fn ensure_no_dependents(
    conn: &mut SqliteConnection,
    table: DocTable,
    id: i64,
) -> DbResult<()> {
    for dep in table.dependents {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ?1", dep.table, dep.column);
        let count: i64 = sqlx::query_scalar(&sql).bind(id).fetch_one(&mut *conn).await?;
        if count > 0 {
            return Err(DbError::related_exist(table.kind, id, count, dep.kind));
        }
    }
    Ok(())
}

pub(crate) async fn delete_row(conn: &mut SqliteConnection, table: DocTable, id: i64) -> DbResult<()> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", table.table);
    let result = sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found(table.kind.to_string(), id));
    }
    Ok(())
}

// =============================================================================
// Header validation
// =============================================================================

/// Contact must be set and exist.
pub(crate) async fn ensure_contact(conn: &mut SqliteConnection, contact_id: i64) -> DbResult<()> {
    meridian_core::validation::validate_contact_id(contact_id)?;
    if fetch_contact(conn, contact_id).await?.is_none() {
        return Err(ValidationError::unknown_reference("Contact", contact_id).into());
    }
    Ok(())
}

/// Optional free-text field within the notes limit.
pub(crate) fn validate_optional_text(field: &str, value: &Option<String>) -> DbResult<()> {
    if let Some(value) = value {
        validate_text(field, value, MAX_NOTES_LEN)?;
    }
    Ok(())
}

/// Checks the header references and prepares lines, outside any transaction.
pub(crate) async fn prepare_document(
    pool: &SqlitePool,
    contact_id: i64,
    notes: &Option<String>,
    items: &[NewLineItem],
) -> DbResult<Vec<LineItem>> {
    validate_optional_text("notes", notes)?;
    let mut conn = pool.acquire().await?;
    ensure_contact(&mut *conn, contact_id).await?;
    prepare_lines(&mut *conn, items).await
}

/// Resolves an optional parent link to the parent's document number.
///
/// An id that does not exist is `UnknownReference`.
pub(crate) async fn parent_document_no(
    pool: &SqlitePool,
    parent: DocTable,
    id: Option<i64>,
) -> DbResult<Option<String>> {
    let Some(id) = id else {
        return Ok(None);
    };
    let sql = format!("SELECT document_no FROM {} WHERE id = ?1", parent.table);
    let number: Option<String> = sqlx::query_scalar(&sql).bind(id).fetch_optional(pool).await?;
    match number {
        Some(number) => Ok(Some(number)),
        None => Err(ValidationError::unknown_reference(parent.kind.to_string(), id).into()),
    }
}

/// New documents always start in their initial status.
pub(crate) fn ensure_initial<S: DocumentStatus>(requested: Option<S>) -> DbResult<S> {
    match requested {
        Some(status) if status != S::INITIAL => {
            Err(CoreError::invalid_transition(S::KIND, S::INITIAL, status).into())
        }
        _ => Ok(S::INITIAL),
    }
}

/// Status for an update: unchanged, or a checked transition.
pub(crate) fn next_status<S: DocumentStatus>(current: S, requested: Option<S>) -> DbResult<S> {
    match requested {
        Some(requested) => Ok(transition(current, requested)?),
        None => Ok(current),
    }
}

// =============================================================================
// Numbering
// =============================================================================

/// Allocates the next `<PREFIX>-<YEAR>-<SEQ>` for `kind`.
///
/// One atomic upsert; two callers can never read the same `last_value`.
pub(crate) async fn allocate_number(pool: &SqlitePool, kind: DocumentKind) -> DbResult<String> {
    let year = Utc::now().year();
    let seq: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO document_sequences (doc_type, year, last_value)
        VALUES (?1, ?2, 1)
        ON CONFLICT (doc_type, year) DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(kind.as_str())
    .bind(year)
    .fetch_one(pool)
    .await?;

    Ok(format_document_no(kind, year, seq))
}

/// Runs `attempt` with a document number, retrying on number conflicts.
///
/// A caller-supplied number is used as-is and never retried; a conflict on
/// it surfaces as `UniqueViolation`. Generated numbers are retried up to
/// `number_retry_limit` times with a fresh allocation.
pub(crate) async fn with_document_number<T, F, Fut>(
    pool: &SqlitePool,
    ctx: &RequestContext,
    settings: RepoSettings,
    kind: DocumentKind,
    supplied: Option<&str>,
    mut attempt: F,
) -> DbResult<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let field = match kind {
        DocumentKind::Payment => "payment_no",
        _ => "document_no",
    };
    let supplied = supplied.map(str::trim).filter(|n| !n.is_empty());
    if let Some(number) = supplied {
        validate_text(field, number, 50)?;
    }

    let mut retries = 0;
    loop {
        ctx.ensure_live()?;
        let number = match supplied {
            Some(number) => number.to_string(),
            None => allocate_number(pool, kind).await?,
        };

        match attempt(number.clone()).await {
            Err(err) if err.is_document_no_conflict() => {
                if supplied.is_some() || retries >= settings.number_retry_limit {
                    return Err(DbError::duplicate(field, number));
                }
                retries += 1;
                warn!(kind = %kind, document_no = %number, retries, "Document number taken, retrying");
            }
            other => return other,
        }
    }
}

// =============================================================================
// Paginated listing
// =============================================================================

fn like_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_filters<'a, S: Display>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &DocumentFilter<S>) {
    qb.push(" WHERE 1 = 1");

    if let Some(status) = &filter.status {
        qb.push(" AND status = ").push_bind(status.to_string());
    }
    if let Some(contact_id) = filter.contact_id {
        qb.push(" AND contact_id = ").push_bind(contact_id);
    }
    if let Some(from) = filter.created_from {
        qb.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.created_to {
        qb.push(" AND created_at < ").push_bind(to);
    }
    if let Some(text) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = like_pattern(text);
        qb.push(" AND (document_no LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR notes LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR contact_id IN (SELECT id FROM contacts WHERE name LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\'))");
    }
}

/// The one list query behind every `get_all`/`get_by_*`/`search`.
///
/// Pagination is validated before any statement runs.
pub(crate) async fn list_documents<D, S>(
    pool: &SqlitePool,
    ctx: &RequestContext,
    settings: RepoSettings,
    filter: &DocumentFilter<S>,
    params: PaginationParams,
) -> DbResult<PagedResult<D>>
where
    D: DocumentRecord,
    S: Display,
{
    params.validate_with_max(settings.max_page_size)?;
    if let Some(text) = &filter.search {
        meridian_core::validation::validate_search_query(text)?;
    }

    ctx.run(async {
        let mut conn = pool.acquire().await?;

        let mut count_qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", D::TABLE.table));
        push_filters(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&mut *conn)
            .await?;

        let mut page_qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT * FROM {}", D::TABLE.table));
        push_filters(&mut page_qb, filter);
        page_qb
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());
        let mut docs: Vec<D> = page_qb.build_query_as().fetch_all(&mut *conn).await?;

        for doc in docs.iter_mut() {
            attach_children(&mut *conn, doc).await?;
        }

        debug!(
            table = D::TABLE.table,
            total,
            page = params.page,
            returned = docs.len(),
            "Listed documents"
        );
        Ok(PagedResult::new(docs, total, params))
    })
    .await
}

/// Timestamp written on every insert/update.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}
