//! Quote pricing arithmetic.
//!
//! A quote total is the sum of `unit_price * quantity` over its lines, with
//! the quote-level percentage discount applied once to that sum and the result
//! rounded half away from zero to cents.

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Largest quantity a single quote line may request.
pub const MAX_LINE_QUANTITY: i32 = 1000;

/// Errors raised while pricing a quote.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("quote has no items")]
    Empty,
    #[error("item {index} has no unit price")]
    Unpriced { index: usize },
    #[error("item {index} has a negative unit price")]
    NegativePrice { index: usize },
    #[error("item {index} quantity must be between 1 and {MAX_LINE_QUANTITY}")]
    InvalidQuantity { index: usize },
    #[error("discount must be between 0 and 100 (got {0})")]
    InvalidDiscount(Decimal),
}

/// One priced (or not yet priced) line of a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub unit_price: Option<Decimal>,
    pub quantity: i32,
}

impl PricedLine {
    #[must_use]
    pub const fn new(unit_price: Option<Decimal>, quantity: i32) -> Self {
        Self {
            unit_price,
            quantity,
        }
    }
}

/// Check that a discount percentage lies in `0..=100`.
///
/// # Errors
///
/// Returns `PricingError::InvalidDiscount` otherwise.
pub fn validate_discount(discount_percent: Decimal) -> Result<(), PricingError> {
    if discount_percent < Decimal::ZERO || discount_percent > Decimal::ONE_HUNDRED {
        return Err(PricingError::InvalidDiscount(discount_percent));
    }
    Ok(())
}

/// Sum of `unit_price * quantity` before discount.
///
/// # Errors
///
/// Fails if there are no lines, a line is unpriced or negative, or a
/// quantity is out of range.
pub fn subtotal(lines: &[PricedLine]) -> Result<Decimal, PricingError> {
    if lines.is_empty() {
        return Err(PricingError::Empty);
    }

    let mut sum = Decimal::ZERO;
    for (index, line) in lines.iter().enumerate() {
        if !(1..=MAX_LINE_QUANTITY).contains(&line.quantity) {
            return Err(PricingError::InvalidQuantity { index });
        }
        let price = line.unit_price.ok_or(PricingError::Unpriced { index })?;
        if price.is_sign_negative() && !price.is_zero() {
            return Err(PricingError::NegativePrice { index });
        }
        sum += price * Decimal::from(line.quantity);
    }
    Ok(sum)
}

/// Compute the discounted, cent-rounded quote total.
///
/// ```
/// use rust_decimal::Decimal;
/// use spareline_core::{PricedLine, quote_total};
///
/// let lines = [
///     PricedLine::new(Some(Decimal::new(4500, 2)), 2),
///     PricedLine::new(Some(Decimal::new(1000, 2)), 1),
/// ];
/// let total = quote_total(&lines, Decimal::new(10, 0)).unwrap();
/// assert_eq!(total, Decimal::new(9000, 2));
/// ```
///
/// # Errors
///
/// Propagates [`subtotal`] errors and rejects discounts outside `0..=100`.
pub fn quote_total(lines: &[PricedLine], discount_percent: Decimal) -> Result<Decimal, PricingError> {
    validate_discount(discount_percent)?;
    let sum = subtotal(lines)?;
    let factor = Decimal::ONE - discount_percent / Decimal::ONE_HUNDRED;
    Ok((sum * factor).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_total_without_discount() {
        let lines = [
            PricedLine::new(Some(d("129.99")), 1),
            PricedLine::new(Some(d("12.50")), 4),
        ];
        assert_eq!(quote_total(&lines, Decimal::ZERO).unwrap(), d("179.99"));
    }

    #[test]
    fn test_discount_applies_to_whole_sum() {
        let lines = [
            PricedLine::new(Some(d("100")), 1),
            PricedLine::new(Some(d("50")), 2),
        ];
        assert_eq!(quote_total(&lines, d("15")).unwrap(), d("170.00"));
    }

    #[test]
    fn test_rounds_half_away_from_zero() {
        // 0.125 * 1 * (1 - 0) -> 0.13
        let lines = [PricedLine::new(Some(d("0.125")), 1)];
        assert_eq!(quote_total(&lines, Decimal::ZERO).unwrap(), d("0.13"));

        // 33.33 * 3 = 99.99, 7.5% off = 92.49075 -> 92.49
        let lines = [PricedLine::new(Some(d("33.33")), 3)];
        assert_eq!(quote_total(&lines, d("7.5")).unwrap(), d("92.49"));
    }

    #[test]
    fn test_full_discount_is_free() {
        let lines = [PricedLine::new(Some(d("80")), 3)];
        assert_eq!(quote_total(&lines, d("100")).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_zero_price_lines_allowed() {
        let lines = [
            PricedLine::new(Some(Decimal::ZERO), 2),
            PricedLine::new(Some(d("10")), 1),
        ];
        assert_eq!(quote_total(&lines, Decimal::ZERO).unwrap(), d("10"));
    }

    #[test]
    fn test_unpriced_line_rejected() {
        let lines = [
            PricedLine::new(Some(d("10")), 1),
            PricedLine::new(None, 1),
        ];
        assert_eq!(
            quote_total(&lines, Decimal::ZERO),
            Err(PricingError::Unpriced { index: 1 })
        );
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(quote_total(&[], Decimal::ZERO), Err(PricingError::Empty));
        assert_eq!(
            quote_total(&[PricedLine::new(Some(d("-1")), 1)], Decimal::ZERO),
            Err(PricingError::NegativePrice { index: 0 })
        );
        assert_eq!(
            quote_total(&[PricedLine::new(Some(d("1")), 0)], Decimal::ZERO),
            Err(PricingError::InvalidQuantity { index: 0 })
        );
        assert!(matches!(
            quote_total(&[PricedLine::new(Some(d("1")), 1)], d("100.01")),
            Err(PricingError::InvalidDiscount(_))
        ));
        assert!(validate_discount(d("-0.5")).is_err());
        assert!(validate_discount(d("0")).is_ok());
    }
}
