//! # meridian-core: Sales Document Rules
//!
//! Pure business logic for the sales document lifecycle engine. No I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Meridian Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Handler layer (HTTP/UI, not part of this repo)       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                meridian-db (repositories)                       │   │
//! │  │   create / update / delete / list / convert / apply payment     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ meridian-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐  │   │
//! │  │   │  money   │ │  status  │ │  totals  │ │ numbering        │  │   │
//! │  │   │  Money   │ │  tables  │ │ Document │ │ pagination       │  │   │
//! │  │   │  TaxRate │ │ per type │ │  Totals  │ │ validation       │  │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - integer minor-unit money
//! - [`types`] - line items, payments, master data, document kinds
//! - [`status`] - one state machine per document type
//! - [`totals`] - line and document totals
//! - [`document`] - quotation, sales order, purchase order, delivery, invoice
//! - [`numbering`] - `PO-2025-00042` style numbers
//! - [`pagination`] - page math and the `PagedResult` envelope
//! - [`validation`] - input checks
//! - [`error`] - domain errors
//!
//! ## Example
//!
//! ```rust
//! use meridian_core::status::{transition, QuotationStatus};
//!
//! let sent = transition(QuotationStatus::Draft, QuotationStatus::Sent).unwrap();
//! assert!(transition(sent, QuotationStatus::Accepted).unwrap().is_convertible());
//! assert!(transition(QuotationStatus::Draft, QuotationStatus::Accepted).is_err());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod document;
pub mod error;
pub mod money;
pub mod numbering;
pub mod pagination;
pub mod status;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use document::*;
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use numbering::DocumentNumber;
pub use pagination::{PagedResult, PaginationParams};
pub use status::{
    transition, DeliveryStatus, DocumentStatus, InvoiceStatus, PurchaseOrderStatus,
    QuotationStatus, SalesOrderStatus,
};
pub use totals::{DocumentTotals, LineTotals, Priced};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Page size used when a caller does not pass one.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest page a list query will return.
pub const MAX_PAGE_SIZE: i64 = 100;

/// How many times creation retries after a document-number conflict.
pub const NUMBER_RETRY_LIMIT: u32 = 5;

/// Upper bound on a single line's quantity.
pub const MAX_ITEM_QUANTITY: i64 = 1_000_000;

/// Upper bound, in cents, on a line's gross amount, a document's gross sum
/// and a payment. Keeps every derived total well inside `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000_000;

/// Upper bound on a line's tax rate: 100% in basis points.
pub const MAX_TAX_BPS: u32 = 10_000;
