//! # Domain Types
//!
//! Building blocks shared by every sales document.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Contact      │   │    Product      │   │    LineItem     │       │
//! │  │  (master data)  │   │  (master data)  │   │  ─────────────  │       │
//! │  │  id (i64)       │   │  id (i64)       │   │  document_id    │       │
//! │  │  name           │   │  code, name     │   │  product_id     │       │
//! │  └─────────────────┘   └─────────────────┘   │  name/code snap │       │
//! │                                              │  qty × price    │       │
//! │  ┌─────────────────┐   ┌─────────────────┐   │  discount, tax  │       │
//! │  │    TaxRate      │   │  DocumentKind   │   │  total          │       │
//! │  │  bps (u32)      │   │  QT SO PO DL    │   └─────────────────┘       │
//! │  │  1800 = 18%     │   │  INV PAY        │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Contacts and products are owned by the surrounding CRUD system. The engine
//! only reads them: to check references exist and to snapshot product
//! name/code onto line items.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate in basis points. 1 bps = 0.01%, so 1800 bps = 18%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a rate from a whole percentage (18 -> 1800 bps).
    #[inline]
    pub const fn from_percent(pct: u32) -> Self {
        TaxRate(pct * 100)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Rate as a percentage, for display only.
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Document Kind
// =============================================================================

/// Every document type the engine numbers and stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Quotation,
    SalesOrder,
    PurchaseOrder,
    Delivery,
    Invoice,
    Payment,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 6] = [
        DocumentKind::Quotation,
        DocumentKind::SalesOrder,
        DocumentKind::PurchaseOrder,
        DocumentKind::Delivery,
        DocumentKind::Invoice,
        DocumentKind::Payment,
    ];

    /// Prefix used in generated document numbers.
    pub const fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Quotation => "QT",
            DocumentKind::SalesOrder => "SO",
            DocumentKind::PurchaseOrder => "PO",
            DocumentKind::Delivery => "DL",
            DocumentKind::Invoice => "INV",
            DocumentKind::Payment => "PAY",
        }
    }

    /// Key stored in the `document_sequences` table.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Quotation => "quotation",
            DocumentKind::SalesOrder => "sales_order",
            DocumentKind::PurchaseOrder => "purchase_order",
            DocumentKind::Delivery => "delivery",
            DocumentKind::Invoice => "invoice",
            DocumentKind::Payment => "payment",
        }
    }

    /// Human label, singular and plural ("1 linked invoice", "2 linked invoices").
    pub const fn label(&self, count: i64) -> &'static str {
        let one = count == 1;
        match self {
            DocumentKind::Quotation => if one { "quotation" } else { "quotations" },
            DocumentKind::SalesOrder => if one { "sales order" } else { "sales orders" },
            DocumentKind::PurchaseOrder => if one { "purchase order" } else { "purchase orders" },
            DocumentKind::Delivery => if one { "delivery" } else { "deliveries" },
            DocumentKind::Invoice => if one { "invoice" } else { "invoices" },
            DocumentKind::Payment => if one { "payment" } else { "payments" },
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.prefix() == prefix)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentKind::Quotation => "Quotation",
            DocumentKind::SalesOrder => "SalesOrder",
            DocumentKind::PurchaseOrder => "PurchaseOrder",
            DocumentKind::Delivery => "Delivery",
            DocumentKind::Invoice => "Invoice",
            DocumentKind::Payment => "Payment",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Master Data (read-only from the engine)
// =============================================================================

/// A customer or supplier referenced by documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Contact {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A sellable product. Prices here are list prices only; the figures on a
/// line item are whatever the document author entered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub unit_price: Money,
    pub tax_rate: TaxRate,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Input for registering a contact (seed data and tests).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewContact {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

impl NewContact {
    pub fn named(name: impl Into<String>) -> Self {
        NewContact {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Input for registering a product (seed data and tests).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub unit_price: Money,
    #[serde(default)]
    pub tax_rate: TaxRate,
}

impl NewProduct {
    pub fn new(code: impl Into<String>, name: impl Into<String>, unit_price: Money) -> Self {
        NewProduct {
            code: code.into(),
            name: name.into(),
            description: None,
            unit_price,
            tax_rate: TaxRate::zero(),
        }
    }
}

// =============================================================================
// Line Items
// =============================================================================

/// A product/quantity/price row owned by exactly one document.
///
/// Product name and code are frozen at write time so the document still
/// reads correctly if the product is later renamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LineItem {
    pub id: i64,
    /// Parent document id (quotation, sales order, ... depending on table).
    pub document_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub product_code: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
    /// Absolute amount subtracted from `quantity × unit_price`.
    pub discount: Money,
    pub tax_rate: TaxRate,
    /// `(quantity × unit_price − discount) × (1 + tax)`.
    pub total: Money,
    /// Zero-based order within the document.
    pub position: i64,
}

/// Caller input for one line item. Totals are never accepted from callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewLineItem {
    pub product_id: i64,
    /// Left empty to snapshot the product's current name.
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
    #[serde(default)]
    pub discount: Money,
    #[serde(default)]
    pub tax_rate: TaxRate,
}

impl NewLineItem {
    pub fn new(product_id: i64, quantity: i64, unit_price: Money) -> Self {
        NewLineItem {
            product_id,
            product_name: None,
            product_code: None,
            description: None,
            quantity,
            unit_price,
            discount: Money::zero(),
            tax_rate: TaxRate::zero(),
        }
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_tax(mut self, rate: TaxRate) -> Self {
        self.tax_rate = rate;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl From<&LineItem> for NewLineItem {
    fn from(item: &LineItem) -> Self {
        NewLineItem {
            product_id: item.product_id,
            product_name: Some(item.product_name.clone()),
            product_code: Some(item.product_code.clone()),
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            discount: item.discount,
            tax_rate: item.tax_rate,
        }
    }
}

// =============================================================================
// Payments
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    BankTransfer,
    Cash,
    Card,
    Cheque,
    Other,
}

/// Money received against an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: i64,
    pub payment_no: String,
    pub invoice_id: i64,
    pub amount: Money,
    #[ts(as = "String")]
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Caller input for recording a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPayment {
    pub invoice_id: i64,
    pub amount: Money,
    #[ts(as = "String")]
    pub payment_date: NaiveDate,
    #[serde(default)]
    pub method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_from_percent() {
        let rate = TaxRate::from_percent(18);
        assert_eq!(rate.bps(), 1800);
        assert!((rate.percentage() - 18.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_kind_prefix_round_trip() {
        for kind in DocumentKind::ALL {
            assert_eq!(DocumentKind::from_prefix(kind.prefix()), Some(kind));
        }
        assert_eq!(DocumentKind::from_prefix("XX"), None);
    }

    #[test]
    fn test_kind_labels_pluralise() {
        assert_eq!(DocumentKind::PurchaseOrder.label(1), "purchase order");
        assert_eq!(DocumentKind::PurchaseOrder.label(2), "purchase orders");
        assert_eq!(DocumentKind::Delivery.label(3), "deliveries");
    }

    #[test]
    fn test_new_line_item_builder() {
        let item = NewLineItem::new(7, 2, Money::from_cents(10000))
            .with_discount(Money::from_cents(1000))
            .with_tax(TaxRate::from_percent(18));
        assert_eq!(item.product_id, 7);
        assert_eq!(item.discount.cents(), 1000);
        assert_eq!(item.tax_rate.bps(), 1800);
    }
}
