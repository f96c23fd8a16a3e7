//! Order pricing.
//!
//! Totals are always computed from catalog prices looked up on the server;
//! the pricing functions take no client-supplied unit prices. Every amount
//! is kept to whole cents and at most [`MAX_AMOUNT`], the largest value a
//! `NUMERIC(12,2)` column holds.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Largest storable money amount: 9,999,999,999.99.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Errors raised while pricing an order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    /// The order has no line items.
    #[error("order must contain at least one item")]
    Empty,
    /// A line item has a quantity of zero.
    #[error("item quantity must be at least 1")]
    ZeroQuantity,
    /// Tax or shipping is negative.
    #[error("{0} cannot be negative")]
    Negative(&'static str),
    /// An amount is above [`MAX_AMOUNT`].
    #[error("{0} is too large")]
    TooLarge(&'static str),
    /// The arithmetic itself overflowed.
    #[error("order total is too large")]
    Overflow,
}

/// Round a money amount to cents, halves away from zero as Postgres
/// `NUMERIC` does, and check it is in range.
///
/// # Errors
///
/// Returns [`PricingError::Negative`] or [`PricingError::TooLarge`], naming
/// the amount with `label`.
pub fn money(amount: Decimal, label: &'static str) -> Result<Decimal, PricingError> {
    let amount = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if amount < Decimal::ZERO {
        return Err(PricingError::Negative(label));
    }
    if amount > MAX_AMOUNT {
        return Err(PricingError::TooLarge(label));
    }
    Ok(amount)
}

/// A priced line item: catalog unit price times quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineItem {
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl LineItem {
    /// Line total, or `None` if the multiplication overflows.
    #[must_use]
    pub fn total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Computed order amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    /// Sum of line totals.
    pub items_price: Decimal,
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
    /// `items_price + tax_price + shipping_price`.
    pub total_price: Decimal,
}

impl OrderTotals {
    /// Price an order. Tax and shipping are rounded to cents first, so the
    /// stored total always equals the sum of the stored parts.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError`] for an empty order, a zero quantity, a
    /// negative or oversized tax or shipping amount, or totals that do not
    /// fit [`MAX_AMOUNT`].
    pub fn compute(
        items: &[LineItem],
        tax_price: Decimal,
        shipping_price: Decimal,
    ) -> Result<Self, PricingError> {
        if items.is_empty() {
            return Err(PricingError::Empty);
        }
        if items.iter().any(|item| item.quantity == 0) {
            return Err(PricingError::ZeroQuantity);
        }
        let tax_price = money(tax_price, "tax")?;
        let shipping_price = money(shipping_price, "shipping")?;

        let items_price = items.iter().try_fold(Decimal::ZERO, |sum, item| {
            item.total()
                .and_then(|total| sum.checked_add(total))
                .ok_or(PricingError::Overflow)
        })?;
        if items_price > MAX_AMOUNT {
            return Err(PricingError::TooLarge("items total"));
        }

        let total_price = items_price
            .checked_add(tax_price)
            .and_then(|sum| sum.checked_add(shipping_price))
            .ok_or(PricingError::Overflow)?;
        if total_price > MAX_AMOUNT {
            return Err(PricingError::TooLarge("order total"));
        }

        Ok(Self {
            items_price,
            tax_price,
            shipping_price,
            total_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: i64, quantity: u32) -> LineItem {
        LineItem {
            unit_price: Decimal::from(price),
            quantity,
        }
    }

    #[test]
    fn test_subtotal_and_total() {
        let totals =
            OrderTotals::compute(&[item(10, 2), item(5, 1)], Decimal::from(2), Decimal::from(3))
                .expect("valid order");

        assert_eq!(totals.items_price, Decimal::from(25));
        assert_eq!(totals.total_price, Decimal::from(30));
    }

    #[test]
    fn test_fractional_prices() {
        let totals = OrderTotals::compute(
            &[LineItem {
                unit_price: Decimal::new(1999, 2),
                quantity: 3,
            }],
            Decimal::ZERO,
            Decimal::ZERO,
        )
        .expect("valid order");

        assert_eq!(totals.items_price, Decimal::new(5997, 2));
    }

    #[test]
    fn test_rejects_empty_and_zero_quantity() {
        assert_eq!(
            OrderTotals::compute(&[], Decimal::ZERO, Decimal::ZERO),
            Err(PricingError::Empty)
        );
        assert_eq!(
            OrderTotals::compute(&[item(5, 0)], Decimal::ZERO, Decimal::ZERO),
            Err(PricingError::ZeroQuantity)
        );
    }

    #[test]
    fn test_rejects_negative_charges() {
        assert_eq!(
            OrderTotals::compute(&[item(5, 1)], Decimal::from(-1), Decimal::ZERO),
            Err(PricingError::Negative("tax"))
        );
        assert_eq!(
            OrderTotals::compute(&[item(5, 1)], Decimal::ZERO, Decimal::from(-3)),
            Err(PricingError::Negative("shipping"))
        );
    }

    #[test]
    fn test_max_amount_is_numeric_12_2_limit() {
        assert_eq!(MAX_AMOUNT, Decimal::new(999_999_999_999, 2));
    }

    #[test]
    fn test_charges_rounded_to_cents() {
        let totals = OrderTotals::compute(
            &[item(10, 1)],
            Decimal::new(5, 3),
            Decimal::new(5, 3),
        )
        .expect("valid order");

        assert_eq!(totals.tax_price, Decimal::new(1, 2));
        assert_eq!(totals.shipping_price, Decimal::new(1, 2));
        assert_eq!(
            totals.total_price,
            totals.items_price + totals.tax_price + totals.shipping_price
        );
    }

    #[test]
    fn test_huge_charges_rejected_without_panic() {
        assert_eq!(
            OrderTotals::compute(&[item(5, 1)], Decimal::MAX, Decimal::MAX),
            Err(PricingError::TooLarge("tax"))
        );
        assert_eq!(
            OrderTotals::compute(&[item(5, 1)], Decimal::ZERO, MAX_AMOUNT),
            Err(PricingError::TooLarge("order total"))
        );
    }

    #[test]
    fn test_huge_unit_price_rejected_without_panic() {
        let line = LineItem {
            unit_price: Decimal::MAX,
            quantity: 2,
        };
        assert_eq!(line.total(), None);
        assert_eq!(
            OrderTotals::compute(&[line], Decimal::ZERO, Decimal::ZERO),
            Err(PricingError::Overflow)
        );
        assert_eq!(
            OrderTotals::compute(
                &[item(1, 1), LineItem { unit_price: Decimal::MAX, quantity: 1 }],
                Decimal::ZERO,
                Decimal::ZERO
            ),
            Err(PricingError::Overflow)
        );
    }

    #[test]
    fn test_money_bounds() {
        assert_eq!(money(Decimal::new(19_999, 3), "price"), Ok(Decimal::new(2000, 2)));
        assert_eq!(money(MAX_AMOUNT, "price"), Ok(MAX_AMOUNT));
        assert_eq!(
            money(MAX_AMOUNT + Decimal::new(1, 2), "price"),
            Err(PricingError::TooLarge("price"))
        );
        assert_eq!(money(Decimal::new(-1, 2), "price"), Err(PricingError::Negative("price")));
    }
}
