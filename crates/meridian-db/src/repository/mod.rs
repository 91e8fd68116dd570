//! # Repository Module
//!
//! Storage for the sales documents, their payments and the master data
//! they reference.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  DocumentRepository<D>      (document.rs)                              │
//! │  ├── get_by_id / list / get_all / get_by_status / get_by_contact       │
//! │  ├── get_by_period / search / count                                    │
//! │  └── delete / update_status                                            │
//! │       │                                                                 │
//! │       │  + per-type create / update / extra queries                    │
//! │       ▼                                                                 │
//! │  QuotationRepository        expire_overdue                             │
//! │  SalesOrderRepository       get_by_quotation                           │
//! │  PurchaseOrderRepository    get_by_sales_order                         │
//! │  DeliveryRepository         get_by_sales_order                         │
//! │  InvoiceRepository          mark_overdue, get_by_sales_order           │
//! │                                                                         │
//! │  PaymentRepository          apply_payment / delete_payment             │
//! │  ContactLookup / ProductLookup                                         │
//! │                                                                         │
//! │  common.rs: items, numbering, row locks, the paginated list query      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub(crate) mod common;
pub mod delivery;
pub mod document;
pub mod invoice;
pub mod master_data;
pub mod payment;
pub mod purchase_order;
pub mod quotation;
pub mod sales_order;

pub use common::RepoSettings;
