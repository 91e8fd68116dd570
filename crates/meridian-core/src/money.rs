//! # Money Module
//!
//! The `Money` type used for every amount on a sales document.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DOCUMENT TOTALS MUST RECONCILE                                         │
//! │                                                                         │
//! │  A quotation, the sales order converted from it and the invoice        │
//! │  raised against that order all carry the same grand total.             │
//! │                                                                         │
//! │  With floats:  190.0 * 0.18 = 34.199999999999996                       │
//! │  With cents:   19000 * 1800 bps / 10000 = 3420 cents                   │
//! │                                                                         │
//! │  Totals are stored, copied and compared as i64 minor units only.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use meridian_core::money::Money;
//!
//! let price = Money::from_major_minor(100, 0); // 100.00
//! let gross = price.multiply_quantity(2);      // 200.00
//! let net = gross - Money::from_cents(1000);   // 190.00
//! assert_eq!(net.to_string(), "190.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

/// A monetary amount in minor currency units (cents).
///
/// Signed so that reversals (payment deletion) can be expressed as
/// negative deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(transparent)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ```rust
    /// use meridian_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(28320).to_string(), "283.20");
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion, always 0-99.
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Applies a tax rate to this amount, rounding half up on minor units.
    ///
    /// Computed as `(amount * bps + 5000) / 10000` in i128 so large
    /// document totals cannot overflow.
    ///
    /// ```rust
    /// use meridian_core::money::Money;
    /// use meridian_core::types::TaxRate;
    ///
    /// let net = Money::from_cents(19000);          // 190.00
    /// let tax = net.calculate_tax(TaxRate::from_bps(1800));
    /// assert_eq!(tax.cents(), 3420);               // 34.20
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        let scaled = self.0 as i128 * rate.bps() as i128;
        let rounded = if scaled >= 0 {
            (scaled + 5000) / 10000
        } else {
            (scaled - 5000) / 10000
        };
        Money(rounded as i64)
    }

    /// Multiplies a unit price by a quantity.
    ///
    /// Callers pass validated lines; use [`Money::checked_mul`] on raw input.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// `None` on overflow.
    #[inline]
    pub const fn checked_mul(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }
}

/// Renders as `major.minor` with no currency symbol; documents are
/// currency-agnostic and formatting belongs to the presentation layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(28320).to_string(), "283.20");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_tax_rounds_half_up() {
        // 0.50 at 1% = 0.005 -> 0.01
        let tax = Money::from_cents(50).calculate_tax(TaxRate::from_bps(100));
        assert_eq!(tax.cents(), 1);

        // 0.49 at 1% = 0.0049 -> 0.00
        let tax = Money::from_cents(49).calculate_tax(TaxRate::from_bps(100));
        assert_eq!(tax.cents(), 0);
    }

    #[test]
    fn test_tax_on_negative_amount_is_symmetric() {
        let rate = TaxRate::from_bps(1800);
        let pos = Money::from_cents(1234).calculate_tax(rate);
        let neg = Money::from_cents(-1234).calculate_tax(rate);
        assert_eq!(pos.cents(), -neg.cents());
    }

    #[test]
    fn test_checked_arithmetic() {
        let price = Money::from_cents(i64::MAX / 1000);
        assert_eq!(price.checked_mul(1_000_000), None);
        assert_eq!(Money::from_cents(250).checked_mul(4), Some(Money::from_cents(1000)));

        assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
        assert_eq!(
            Money::from_cents(100).checked_add(Money::from_cents(-30)),
            Some(Money::from_cents(70))
        );
    }

    #[test]
    fn test_sum() {
        let amounts = [Money::from_cents(19000), Money::from_cents(5000)];
        let total: Money = amounts.iter().sum();
        assert_eq!(total.cents(), 24000);
    }

    #[test]
    fn test_sign_checks() {
        assert!(Money::zero().is_zero());
        assert!(Money::from_cents(1).is_positive());
        assert!(Money::from_cents(-1).is_negative());
        assert_eq!(Money::from_cents(-1).abs().cents(), 1);
    }
}
