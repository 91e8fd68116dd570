//! # Database Error Types
//!
//! Error types for repository, conversion and reconciliation operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        CoreError (meridian-core)           │
//! │       │                                 │                               │
//! │       ▼                                 ▼                               │
//! │  DbError (this module) ◄────────────────┘                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Handler layer (outside this repo) decides how to present it           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant is returned, never panicked. The transaction that produced
//! it is dropped on the way out, which rolls it back.

use meridian_core::error::CoreError;
use meridian_core::types::DocumentKind;
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `get_by_id` on an id that was never created or was deleted
    /// - `update`/`delete` on a missing row (checked before mutating)
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Delete blocked by documents that still reference the row.
    #[error("{entity} {id} cannot be deleted: {count} linked {related}")]
    RelatedRecordsExist {
        entity: String,
        id: i64,
        count: i64,
        related: String,
    },

    /// The caller cancelled the request before the operation finished.
    #[error("Request cancelled")]
    ContextCancelled,

    /// The caller's deadline passed before the operation finished.
    #[error("Request deadline exceeded")]
    ContextTimeout,

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Two concurrent creates landed on the same document number
    /// - Caller supplied a document number that already exists
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Line item referencing a non-existent product
    /// - Deleting a row that a constraint still protects
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),

    /// Business rule violation (status transition, pagination, validation).
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Delete blocked by `count` documents of type `related`.
    ///
    /// ```rust
    /// use meridian_core::types::DocumentKind;
    /// use meridian_db::DbError;
    ///
    /// let err = DbError::related_exist(DocumentKind::SalesOrder, 4, 2, DocumentKind::PurchaseOrder);
    /// assert_eq!(
    ///     err.to_string(),
    ///     "SalesOrder 4 cannot be deleted: 2 linked purchase orders"
    /// );
    /// ```
    pub fn related_exist(entity: DocumentKind, id: i64, count: i64, related: DocumentKind) -> Self {
        DbError::RelatedRecordsExist {
            entity: entity.to_string(),
            id,
            count,
            related: related.label(count).to_string(),
        }
    }

    /// Whether retrying the same call could succeed.
    ///
    /// Only uniqueness conflicts qualify; creation already retries those
    /// internally with a fresh number.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }

    /// True when the unique violation is on a `document_no` column.
    pub(crate) fn is_document_no_conflict(&self) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field.ends_with(".document_no") || field.ends_with(".payment_no"))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<meridian_core::ValidationError> for DbError {
    fn from(err: meridian_core::ValidationError) -> Self {
        DbError::Core(CoreError::Validation(err))
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
