//! # Validation Module
//!
//! Input checks run by the repositories before anything touches storage.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: THIS MODULE                                                  │
//! │  ├── quantity > 0, unit price > 0, tax rate <= 100%                    │
//! │  ├── 0 <= discount <= quantity × unit price                            │
//! │  ├── line and document gross <= MAX_AMOUNT_CENTS                       │
//! │  └── required references, text lengths                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Repository                                                   │
//! │  └── referenced contact/product/parent rows exist                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── CHECK (quantity > 0), UNIQUE (document_no)                        │
//! │  └── FOREIGN KEY ... ON DELETE RESTRICT                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{NewLineItem, TaxRate};
use crate::{MAX_AMOUNT_CENTS, MAX_ITEM_QUANTITY, MAX_TAX_BPS};

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted free-text search term.
pub const MAX_SEARCH_LEN: usize = 100;

/// Longest accepted notes/terms field.
pub const MAX_NOTES_LEN: usize = 4000;

// =============================================================================
// References
// =============================================================================

/// Validates a reference id (contact, product, parent document).
pub fn validate_reference(field: &str, id: i64) -> ValidationResult<()> {
    if id <= 0 {
        return Err(ValidationError::required(field));
    }
    Ok(())
}

pub fn validate_contact_id(id: i64) -> ValidationResult<()> {
    validate_reference("contact_id", id)
}

// =============================================================================
// Line Items
// =============================================================================

pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

pub fn validate_unit_price(price: Money) -> ValidationResult<()> {
    if !price.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "unit_price".to_string(),
        });
    }
    Ok(())
}

pub fn validate_tax_rate(rate: TaxRate) -> ValidationResult<()> {
    if rate.bps() > MAX_TAX_BPS {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: i64::from(MAX_TAX_BPS),
        });
    }
    Ok(())
}

fn amount_out_of_range(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: MAX_AMOUNT_CENTS,
    }
}

/// `quantity × unit_price`, rejected if it overflows or exceeds the cap.
pub fn validate_line_gross(item: &NewLineItem) -> ValidationResult<Money> {
    match item.unit_price.checked_mul(item.quantity) {
        Some(gross) if gross.cents() <= MAX_AMOUNT_CENTS => Ok(gross),
        _ => Err(amount_out_of_range("line_amount")),
    }
}

/// Discount is an absolute amount and may not exceed the line's gross value.
pub fn validate_discount(discount: Money, gross: Money) -> ValidationResult<()> {
    if discount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "discount".to_string(),
        });
    }
    if discount > gross {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: gross.cents(),
        });
    }
    Ok(())
}

/// Validates one caller-supplied line.
///
/// ```rust
/// use meridian_core::money::Money;
/// use meridian_core::types::NewLineItem;
/// use meridian_core::validation::validate_line_item;
///
/// let ok = NewLineItem::new(1, 2, Money::from_cents(10000)).with_discount(Money::from_cents(1000));
/// assert!(validate_line_item(&ok).is_ok());
///
/// let zero_qty = NewLineItem::new(1, 0, Money::from_cents(10000));
/// assert!(validate_line_item(&zero_qty).is_err());
/// ```
pub fn validate_line_item(item: &NewLineItem) -> ValidationResult<()> {
    validate_reference("product_id", item.product_id)?;
    validate_quantity(item.quantity)?;
    validate_unit_price(item.unit_price)?;
    validate_tax_rate(item.tax_rate)?;
    let gross = validate_line_gross(item)?;
    validate_discount(item.discount, gross)?;
    if let Some(desc) = &item.description {
        validate_text("description", desc, MAX_NOTES_LEN)?;
    }
    Ok(())
}

/// Validates every line and caps the document's gross sum.
pub fn validate_line_items(items: &[NewLineItem]) -> ValidationResult<()> {
    let mut gross = Money::zero();
    for item in items {
        validate_line_item(item)?;
        gross = gross
            .checked_add(validate_line_gross(item)?)
            .filter(|sum| sum.cents() <= MAX_AMOUNT_CENTS)
            .ok_or_else(|| amount_out_of_range("document_amount"))?;
    }
    Ok(())
}

// =============================================================================
// Payments
// =============================================================================

pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    if amount.cents() > MAX_AMOUNT_CENTS {
        return Err(amount_out_of_range("amount"));
    }
    Ok(())
}

/// Running total of an invoice's payments after adding `amount`.
pub fn add_payment(amount_paid: Money, amount: Money) -> ValidationResult<Money> {
    amount_paid
        .checked_add(amount)
        .ok_or_else(|| amount_out_of_range("amount_paid"))
}

// =============================================================================
// Text
// =============================================================================

pub fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Trims a search term. Empty means "no text filter".
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();
    validate_text("query", query, MAX_SEARCH_LEN)?;
    Ok(query.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(qty: i64, price: i64, discount: i64) -> NewLineItem {
        NewLineItem::new(1, qty, Money::from_cents(price)).with_discount(Money::from_cents(discount))
    }

    #[test]
    fn test_quantity_must_be_positive() {
        assert!(validate_quantity(1).is_ok());
        assert!(matches!(
            validate_quantity(0),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(validate_quantity(-3).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_price_must_be_positive() {
        assert!(validate_line_item(&line(1, 0, 0)).is_err());
        assert!(validate_line_item(&line(1, -100, 0)).is_err());
    }

    #[test]
    fn test_discount_bounded_by_gross() {
        assert!(validate_line_item(&line(2, 10000, 20000)).is_ok());
        assert!(matches!(
            validate_line_item(&line(2, 10000, 20001)),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            validate_line_item(&line(2, 10000, -1)),
            Err(ValidationError::MustNotBeNegative { .. })
        ));
    }

    #[test]
    fn test_overflowing_line_is_rejected() {
        let huge = NewLineItem::new(1, MAX_ITEM_QUANTITY, Money::from_cents(i64::MAX / 1000));
        assert!(matches!(
            validate_line_item(&huge),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "line_amount"
        ));

        let at_cap = NewLineItem::new(1, 1, Money::from_cents(MAX_AMOUNT_CENTS));
        assert!(validate_line_item(&at_cap).is_ok());
        assert!(validate_line_item(&line(1, MAX_AMOUNT_CENTS + 1, 0)).is_err());
    }

    #[test]
    fn test_document_gross_is_capped() {
        let half = NewLineItem::new(1, 1, Money::from_cents(MAX_AMOUNT_CENTS / 2));
        assert!(validate_line_items(&[half.clone(), half.clone()]).is_ok());
        assert!(matches!(
            validate_line_items(&[half.clone(), half.clone(), half]),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "document_amount"
        ));
    }

    #[test]
    fn test_tax_rate_capped_at_one_hundred_percent() {
        let full = line(1, 100, 0).with_tax(TaxRate::from_bps(MAX_TAX_BPS));
        assert!(validate_line_item(&full).is_ok());
        let over = line(1, 100, 0).with_tax(TaxRate::from_bps(MAX_TAX_BPS + 1));
        assert!(validate_line_item(&over).is_err());
    }

    #[test]
    fn test_payment_running_total_overflow() {
        assert!(validate_payment_amount(Money::from_cents(MAX_AMOUNT_CENTS + 1)).is_err());
        assert_eq!(
            add_payment(Money::from_cents(100), Money::from_cents(50)).unwrap(),
            Money::from_cents(150)
        );
        assert!(add_payment(Money::from_cents(i64::MAX), Money::from_cents(1)).is_err());
    }

    #[test]
    fn test_missing_product_reference() {
        let item = NewLineItem::new(0, 1, Money::from_cents(100));
        assert!(matches!(
            validate_line_item(&item),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_first_bad_line_wins() {
        let items = vec![line(1, 100, 0), line(0, 100, 0), line(1, 0, 0)];
        let err = validate_line_items(&items).unwrap_err();
        assert!(matches!(err, ValidationError::MustBePositive { field } if field == "quantity"));
    }

    #[test]
    fn test_search_query_is_trimmed() {
        assert_eq!(validate_search_query("  acme ").unwrap(), "acme");
        assert!(validate_search_query(&"x".repeat(MAX_SEARCH_LEN + 1)).is_err());
    }

    #[test]
    fn test_payment_amount() {
        assert!(validate_payment_amount(Money::from_cents(1)).is_ok());
        assert!(validate_payment_amount(Money::zero()).is_err());
    }
}
