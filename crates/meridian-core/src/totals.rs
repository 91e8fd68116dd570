//! # Financial Computation
//!
//! Line-item and document totals. Pure functions, no I/O.
//!
//! ## Formulas
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Per line i:                                                            │
//! │    net_i   = quantity_i × unit_price_i − discount_i                    │
//! │    tax_i   = net_i × tax_rate_i            (half-up on minor units)    │
//! │    total_i = net_i + tax_i                                             │
//! │                                                                         │
//! │  Per document:                                                          │
//! │    SubTotal      = Σ net_i                                             │
//! │    TaxTotal      = Σ tax_i                                             │
//! │    DiscountTotal = Σ discount_i                                        │
//! │    GrandTotal    = SubTotal + TaxTotal   (= Σ total_i)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repositories call [`DocumentTotals::compute`] on every create and update,
//! so stored totals are always derived and never written by callers.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{LineItem, NewLineItem, TaxRate};

/// Anything that carries the four pricing inputs of a line.
pub trait Priced {
    fn quantity(&self) -> i64;
    fn unit_price(&self) -> Money;
    fn discount(&self) -> Money;
    fn tax_rate(&self) -> TaxRate;

    fn line_totals(&self) -> LineTotals {
        LineTotals::compute(self.quantity(), self.unit_price(), self.discount(), self.tax_rate())
    }
}

impl Priced for NewLineItem {
    fn quantity(&self) -> i64 {
        self.quantity
    }
    fn unit_price(&self) -> Money {
        self.unit_price
    }
    fn discount(&self) -> Money {
        self.discount
    }
    fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }
}

impl Priced for LineItem {
    fn quantity(&self) -> i64 {
        self.quantity
    }
    fn unit_price(&self) -> Money {
        self.unit_price
    }
    fn discount(&self) -> Money {
        self.discount
    }
    fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }
}

/// Breakdown of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTotals {
    pub gross: Money,
    pub discount: Money,
    pub net: Money,
    pub tax: Money,
    pub total: Money,
}

impl LineTotals {
    pub fn compute(quantity: i64, unit_price: Money, discount: Money, tax_rate: TaxRate) -> Self {
        let gross = unit_price.multiply_quantity(quantity);
        let net = gross - discount;
        let tax = net.calculate_tax(tax_rate);
        LineTotals {
            gross,
            discount,
            net,
            tax,
            total: net + tax,
        }
    }
}

/// Aggregated document figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DocumentTotals {
    pub subtotal: Money,
    pub tax_total: Money,
    pub discount_total: Money,
    pub grand_total: Money,
}

impl DocumentTotals {
    /// Computes document totals over an ordered list of lines.
    ///
    /// ```rust
    /// use meridian_core::money::Money;
    /// use meridian_core::totals::DocumentTotals;
    /// use meridian_core::types::{NewLineItem, TaxRate};
    ///
    /// let items = vec![
    ///     NewLineItem::new(1, 2, Money::from_cents(10000))
    ///         .with_discount(Money::from_cents(1000))
    ///         .with_tax(TaxRate::from_percent(18)),
    ///     NewLineItem::new(2, 1, Money::from_cents(5000))
    ///         .with_tax(TaxRate::from_percent(18)),
    /// ];
    /// let totals = DocumentTotals::compute(&items);
    /// assert_eq!(totals.subtotal.cents(), 24000);
    /// assert_eq!(totals.tax_total.cents(), 4320);
    /// assert_eq!(totals.grand_total.cents(), 28320);
    /// ```
    pub fn compute<'a, T, I>(items: I) -> Self
    where
        T: Priced + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut totals = DocumentTotals::default();
        for item in items {
            let line = item.line_totals();
            totals.subtotal += line.net;
            totals.tax_total += line.tax;
            totals.discount_total += line.discount;
        }
        totals.grand_total = totals.subtotal + totals.tax_total;
        totals
    }

    /// True when these stored figures match what `items` compute to.
    pub fn reconciles_with<'a, T, I>(&self, items: I) -> bool
    where
        T: Priced + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        *self == DocumentTotals::compute(items)
    }
}
