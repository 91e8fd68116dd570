//! # Sales Documents
//!
//! The five line-item documents of the sales chain, their caller inputs,
//! list filters, and the reporting-only `SalesProcess` aggregate.
//!
//! ## Document Chain
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Quotation ──0..1──► SalesOrder ──0..1──► PurchaseOrder                │
//! │  (QT-2025-00001)     (quotation_id)  │    (sales_order_id, so_no)      │
//! │                                      ├──0..n──► Delivery               │
//! │                                      └──0..n──► Invoice ──0..n──► Payment
//! │                                                                         │
//! │  Links are plain i64 ids resolved by repository calls. No document     │
//! │  holds another document by value except inside `SalesProcess`.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every document carries the same money columns
//! (`subtotal`, `tax_total`, `discount_total`, `grand_total`) which are
//! always [`DocumentTotals::compute`] over its items.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::status::{
    DeliveryStatus, DocumentStatus, InvoiceStatus, PurchaseOrderStatus, QuotationStatus,
    SalesOrderStatus,
};
use crate::totals::DocumentTotals;
use crate::types::{Contact, DocumentKind, LineItem, NewLineItem};

// =============================================================================
// Shared behaviour
// =============================================================================

/// Accessors shared by all five line-item documents.
pub trait SalesDocument {
    type Status: DocumentStatus;

    fn id(&self) -> i64;
    fn document_no(&self) -> &str;
    fn contact_id(&self) -> i64;
    fn status(&self) -> Self::Status;
    fn items(&self) -> &[LineItem];
    fn totals(&self) -> DocumentTotals;
    fn created_at(&self) -> DateTime<Utc>;

    /// Attaches children loaded by a separate query.
    fn attach(&mut self, items: Vec<LineItem>, contact: Option<Contact>);

    fn kind(&self) -> DocumentKind {
        <Self::Status as DocumentStatus>::KIND
    }

    /// True when the stored totals equal what the items compute to.
    fn totals_reconcile(&self) -> bool {
        self.totals().reconciles_with(self.items())
    }
}

macro_rules! sales_document {
    ($ty:ident, $status:ident) => {
        impl SalesDocument for $ty {
            type Status = $status;

            fn id(&self) -> i64 {
                self.id
            }
            fn document_no(&self) -> &str {
                &self.document_no
            }
            fn contact_id(&self) -> i64 {
                self.contact_id
            }
            fn status(&self) -> $status {
                self.status
            }
            fn items(&self) -> &[LineItem] {
                &self.items
            }
            fn totals(&self) -> DocumentTotals {
                DocumentTotals {
                    subtotal: self.subtotal,
                    tax_total: self.tax_total,
                    discount_total: self.discount_total,
                    grand_total: self.grand_total,
                }
            }
            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }
            fn attach(&mut self, items: Vec<LineItem>, contact: Option<Contact>) {
                self.items = items;
                self.contact = contact;
            }
        }
    };
}

// =============================================================================
// Quotation
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Quotation {
    pub id: i64,
    pub document_no: String,
    pub contact_id: i64,
    pub status: QuotationStatus,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    /// Commercial terms; become the sales order's payment terms on conversion.
    pub terms: Option<String>,
    pub subtotal: Money,
    pub tax_total: Money,
    pub discount_total: Money,
    pub grand_total: Money,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub contact: Option<Contact>,
}

sales_document!(Quotation, QuotationStatus);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewQuotation {
    pub contact_id: i64,
    /// Leave empty to have one generated.
    #[serde(default)]
    pub document_no: Option<String>,
    /// On update, a requested status change checked against the table.
    #[serde(default)]
    pub status: Option<QuotationStatus>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub terms: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<NewLineItem>,
}

// =============================================================================
// Sales Order
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesOrder {
    pub id: i64,
    pub document_no: String,
    pub contact_id: i64,
    /// Source quotation when created by conversion.
    pub quotation_id: Option<i64>,
    pub status: SalesOrderStatus,
    #[ts(as = "Option<String>")]
    pub expected_date: Option<NaiveDate>,
    pub payment_terms: Option<String>,
    pub subtotal: Money,
    pub tax_total: Money,
    pub discount_total: Money,
    pub grand_total: Money,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub contact: Option<Contact>,
}

sales_document!(SalesOrder, SalesOrderStatus);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSalesOrder {
    pub contact_id: i64,
    #[serde(default)]
    pub document_no: Option<String>,
    #[serde(default)]
    pub status: Option<SalesOrderStatus>,
    #[serde(default)]
    pub quotation_id: Option<i64>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub expected_date: Option<NaiveDate>,
    #[serde(default)]
    pub payment_terms: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<NewLineItem>,
}

// =============================================================================
// Purchase Order
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrder {
    pub id: i64,
    pub document_no: String,
    pub contact_id: i64,
    pub sales_order_id: Option<i64>,
    /// Document number of the originating sales order, frozen at creation.
    pub so_no: Option<String>,
    pub status: PurchaseOrderStatus,
    #[ts(as = "Option<String>")]
    pub expected_date: Option<NaiveDate>,
    pub payment_terms: Option<String>,
    pub subtotal: Money,
    pub tax_total: Money,
    pub discount_total: Money,
    pub grand_total: Money,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub contact: Option<Contact>,
}

sales_document!(PurchaseOrder, PurchaseOrderStatus);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPurchaseOrder {
    pub contact_id: i64,
    #[serde(default)]
    pub document_no: Option<String>,
    #[serde(default)]
    pub status: Option<PurchaseOrderStatus>,
    #[serde(default)]
    pub sales_order_id: Option<i64>,
    #[serde(default)]
    pub so_no: Option<String>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub expected_date: Option<NaiveDate>,
    #[serde(default)]
    pub payment_terms: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<NewLineItem>,
}

// =============================================================================
// Delivery
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Delivery {
    pub id: i64,
    pub document_no: String,
    pub contact_id: i64,
    pub sales_order_id: Option<i64>,
    pub status: DeliveryStatus,
    #[ts(as = "Option<String>")]
    pub delivery_date: Option<NaiveDate>,
    pub tracking_number: Option<String>,
    pub subtotal: Money,
    pub tax_total: Money,
    pub discount_total: Money,
    pub grand_total: Money,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub contact: Option<Contact>,
}

sales_document!(Delivery, DeliveryStatus);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewDelivery {
    pub contact_id: i64,
    #[serde(default)]
    pub document_no: Option<String>,
    #[serde(default)]
    pub status: Option<DeliveryStatus>,
    #[serde(default)]
    pub sales_order_id: Option<i64>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<NewLineItem>,
}

// =============================================================================
// Invoice
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: i64,
    pub document_no: String,
    pub contact_id: i64,
    pub sales_order_id: Option<i64>,
    pub status: InvoiceStatus,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    /// Sum of recorded payments. Only the payment repository writes this.
    pub amount_paid: Money,
    pub subtotal: Money,
    pub tax_total: Money,
    pub discount_total: Money,
    pub grand_total: Money,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub contact: Option<Contact>,
}

sales_document!(Invoice, InvoiceStatus);

impl Invoice {
    /// Amount still owed; never negative.
    pub fn balance_due(&self) -> Money {
        let due = self.grand_total - self.amount_paid;
        if due.is_negative() {
            Money::zero()
        } else {
            due
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewInvoice {
    pub contact_id: i64,
    #[serde(default)]
    pub document_no: Option<String>,
    #[serde(default)]
    pub status: Option<InvoiceStatus>,
    #[serde(default)]
    pub sales_order_id: Option<i64>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<NewLineItem>,
}

// =============================================================================
// List Filters
// =============================================================================

/// Optional predicates for list queries. All set fields are ANDed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DocumentFilter<S> {
    #[serde(default)]
    pub status: Option<S>,
    #[serde(default)]
    pub contact_id: Option<i64>,
    /// Inclusive lower bound on `created_at`.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub created_to: Option<DateTime<Utc>>,
    /// Matched against document number, notes and contact name.
    #[serde(default)]
    pub search: Option<String>,
}

impl<S> Default for DocumentFilter<S> {
    fn default() -> Self {
        DocumentFilter {
            status: None,
            contact_id: None,
            created_from: None,
            created_to: None,
            search: None,
        }
    }
}

impl<S> DocumentFilter<S> {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: S) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_contact(mut self, contact_id: i64) -> Self {
        self.contact_id = Some(contact_id);
        self
    }

    pub fn with_period(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.created_from = Some(from);
        self.created_to = Some(to);
        self
    }

    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }
}

// =============================================================================
// Sales Process (reporting only)
// =============================================================================

/// Documents that grew out of one sales order, with derived figures.
///
/// Nothing here is authoritative; every money field is recomputed from the
/// documents each time the aggregate is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesProcess {
    pub contact_id: i64,
    pub quotation: Option<Quotation>,
    pub sales_order: SalesOrder,
    pub purchase_order: Option<PurchaseOrder>,
    pub deliveries: Vec<Delivery>,
    pub invoices: Vec<Invoice>,
    pub total_value: Money,
    /// Sales order subtotal minus purchase order subtotal.
    pub profit: Money,
    pub amount_invoiced: Money,
    pub amount_paid: Money,
}

impl SalesProcess {
    pub fn assemble(
        quotation: Option<Quotation>,
        sales_order: SalesOrder,
        purchase_order: Option<PurchaseOrder>,
        deliveries: Vec<Delivery>,
        invoices: Vec<Invoice>,
    ) -> Self {
        let cost = purchase_order
            .as_ref()
            .map(|po| po.subtotal)
            .unwrap_or_default();
        let live_invoices = || {
            invoices
                .iter()
                .filter(|inv| inv.status != InvoiceStatus::Cancelled)
        };
        let amount_invoiced = live_invoices().map(|inv| inv.grand_total).sum();
        let amount_paid = live_invoices().map(|inv| inv.amount_paid).sum();

        SalesProcess {
            contact_id: sales_order.contact_id,
            total_value: sales_order.grand_total,
            profit: sales_order.subtotal - cost,
            amount_invoiced,
            amount_paid,
            quotation,
            sales_order,
            purchase_order,
            deliveries,
            invoices,
        }
    }

    pub fn outstanding(&self) -> Money {
        self.amount_invoiced - self.amount_paid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales_order(subtotal: i64, grand: i64) -> SalesOrder {
        let now = Utc::now();
        SalesOrder {
            id: 1,
            document_no: "SO-2025-00001".to_string(),
            contact_id: 9,
            quotation_id: None,
            status: SalesOrderStatus::Confirmed,
            expected_date: None,
            payment_terms: None,
            subtotal: Money::from_cents(subtotal),
            tax_total: Money::from_cents(grand - subtotal),
            discount_total: Money::zero(),
            grand_total: Money::from_cents(grand),
            notes: None,
            created_at: now,
            updated_at: now,
            items: Vec::new(),
            contact: None,
        }
    }

    fn invoice(status: InvoiceStatus, grand: i64, paid: i64) -> Invoice {
        let now = Utc::now();
        Invoice {
            id: 1,
            document_no: "INV-2025-00001".to_string(),
            contact_id: 9,
            sales_order_id: Some(1),
            status,
            due_date: None,
            amount_paid: Money::from_cents(paid),
            subtotal: Money::from_cents(grand),
            tax_total: Money::zero(),
            discount_total: Money::zero(),
            grand_total: Money::from_cents(grand),
            notes: None,
            created_at: now,
            updated_at: now,
            items: Vec::new(),
            contact: None,
        }
    }

    #[test]
    fn test_profit_without_purchase_order_is_subtotal() {
        let process = SalesProcess::assemble(None, sales_order(24000, 28320), None, vec![], vec![]);
        assert_eq!(process.total_value, Money::from_cents(28320));
        assert_eq!(process.profit, Money::from_cents(24000));
        assert_eq!(process.contact_id, 9);
    }

    #[test]
    fn test_cancelled_invoices_are_not_counted() {
        let invoices = vec![
            invoice(InvoiceStatus::Partial, 10000, 4000),
            invoice(InvoiceStatus::Cancelled, 5000, 0),
        ];
        let process = SalesProcess::assemble(None, sales_order(24000, 28320), None, vec![], invoices);
        assert_eq!(process.amount_invoiced, Money::from_cents(10000));
        assert_eq!(process.amount_paid, Money::from_cents(4000));
        assert_eq!(process.outstanding(), Money::from_cents(6000));
    }

    #[test]
    fn test_balance_due_never_negative() {
        assert_eq!(invoice(InvoiceStatus::Paid, 100, 150).balance_due(), Money::zero());
        assert_eq!(invoice(InvoiceStatus::Partial, 100, 30).balance_due(), Money::from_cents(70));
    }

    #[test]
    fn test_filter_builder() {
        let filter = DocumentFilter::all()
            .with_status(QuotationStatus::Sent)
            .with_contact(3)
            .with_search("acme");
        assert_eq!(filter.status, Some(QuotationStatus::Sent));
        assert_eq!(filter.contact_id, Some(3));
        assert_eq!(filter.search.as_deref(), Some("acme"));
        assert!(filter.created_from.is_none());
    }

    #[test]
    fn test_kind_follows_status_type() {
        let empty = sales_order(0, 0);
        assert_eq!(empty.kind(), DocumentKind::SalesOrder);
        assert!(empty.totals_reconcile());

        // stored totals with no items behind them do not reconcile
        assert!(!sales_order(100, 118).totals_reconcile());
    }
}
