//! # meridian-db: Sales Document Persistence
//!
//! Repositories, conversions and payment reconciliation for the sales
//! document lifecycle, on SQLite through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Meridian Data Flow                               │
//! │                                                                         │
//! │  Handler (HTTP/UI, outside this repo)                                  │
//! │       │  RequestContext (cancel token + deadline)                      │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   meridian-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐  ┌────────────────┐  ┌──────────────────┐  │   │
//! │  │   │   Database    │  │  Repositories  │  │ ConversionEngine │  │   │
//! │  │   │   (pool.rs)   │◄─│  quotation ... │  │ SalesProcess     │  │   │
//! │  │   │  SqlitePool   │  │  payment       │  │   Report         │  │   │
//! │  │   │  migrations   │  │  master data   │  │                  │  │   │
//! │  │   └───────────────┘  └────────────────┘  └──────────────────┘  │   │
//! │  │            │        rules from meridian-core                    │   │
//! │  └────────────┼────────────────────────────────────────────────────┘   │
//! │               ▼                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - Engine settings from the environment
//! - [`context`] - Cancellation and deadlines per call
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Document, payment and master-data repositories
//! - [`conversion`] - Quotation → sales order → purchase order / invoice
//! - [`report`] - Sales process aggregates
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meridian_db::{Database, DbConfig, RequestContext};
//!
//! let db = Database::new(DbConfig::new("sales.db")).await?;
//! let ctx = RequestContext::background();
//!
//! let quotation = db.quotations().create(&ctx, &new_quotation).await?;
//! db.quotations().update_status(&ctx, quotation.id, QuotationStatus::Sent).await?;
//! db.quotations().update_status(&ctx, quotation.id, QuotationStatus::Accepted).await?;
//! let order = db.conversions().convert_quotation_to_sales_order(&ctx, quotation.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod context;
pub mod conversion;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod report;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, EngineConfig};
pub use context::RequestContext;
pub use conversion::ConversionEngine;
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use report::SalesProcessReport;

// Repository re-exports for convenience
pub use repository::delivery::DeliveryRepository;
pub use repository::document::DocumentRepository;
pub use repository::invoice::InvoiceRepository;
pub use repository::master_data::{ContactLookup, ProductLookup};
pub use repository::payment::PaymentRepository;
pub use repository::purchase_order::PurchaseOrderRepository;
pub use repository::quotation::QuotationRepository;
pub use repository::sales_order::SalesOrderRepository;
pub use repository::RepoSettings;
