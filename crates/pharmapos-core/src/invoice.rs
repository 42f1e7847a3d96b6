//! # Invoice Math
//!
//! Pure totals computation for sale creation.
//!
//! The flow mirrors what happens at the counter: each line gets its per-item
//! discount, the discounted lines sum into the subtotal, then the order-level
//! discount comes off the subtotal.
//!
//! ```text
//! gross line   = unit_price × quantity
//! line subtotal = gross line − item discount      (floored at 0)
//! subtotal      = Σ line subtotals
//! total         = subtotal − order discount       (floored at 0)
//! ```
//!
//! Totals are always recomputed here from the raw inputs. A caller-declared
//! total is checked against the recomputation and rejected on mismatch, so a
//! stale or tampered client can never write its own arithmetic.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::Discount;

// =============================================================================
// Priced Line
// =============================================================================

/// One sale line after pricing: gross, discount taken, and what remains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub gross_cents: i64,
    pub discount_cents: i64,
    pub subtotal_cents: i64,
}

/// Prices a single line: gross = unit price × quantity, minus the per-item
/// discount. Fixed discounts cap at the gross, so the subtotal is never
/// negative.
pub fn price_line(
    unit_price_cents: i64,
    quantity: i64,
    discount: Option<Discount>,
) -> CoreResult<PricedLine> {
    let gross_cents = unit_price_cents
        .checked_mul(quantity)
        .ok_or(CoreError::AmountOverflow {
            context: "line gross",
        })?;
    let gross = Money::from_cents(gross_cents);
    let discount_amount = discount.unwrap_or_default().amount_for(gross);
    let subtotal = gross.saturating_discount(discount_amount);
    Ok(PricedLine {
        gross_cents,
        discount_cents: discount_amount.cents(),
        subtotal_cents: subtotal.cents(),
    })
}

// =============================================================================
// Order Totals
// =============================================================================

/// The complete money breakdown of one invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    /// Sum of line subtotals (per-item discounts already applied).
    pub subtotal_cents: i64,
    /// Cents taken off by per-item discounts.
    pub items_discount_cents: i64,
    /// Cents taken off by the order-level discount.
    pub order_discount_cents: i64,
    /// items_discount + order_discount.
    pub total_discount_cents: i64,
    /// What the customer owes.
    pub total_cents: i64,
}

/// Folds priced lines and the order-level discount into invoice totals.
pub fn order_totals(lines: &[PricedLine], order_discount: Discount) -> CoreResult<OrderTotals> {
    let mut subtotal_cents: i64 = 0;
    let mut items_discount_cents: i64 = 0;
    for line in lines {
        subtotal_cents =
            subtotal_cents
                .checked_add(line.subtotal_cents)
                .ok_or(CoreError::AmountOverflow {
                    context: "invoice subtotal",
                })?;
        items_discount_cents = items_discount_cents
            .checked_add(line.discount_cents)
            .ok_or(CoreError::AmountOverflow {
                context: "items discount",
            })?;
    }

    let subtotal = Money::from_cents(subtotal_cents);
    let order_discount_amount = order_discount.amount_for(subtotal);
    let total = subtotal.saturating_discount(order_discount_amount);

    Ok(OrderTotals {
        subtotal_cents,
        items_discount_cents,
        order_discount_cents: order_discount_amount.cents(),
        total_discount_cents: items_discount_cents + order_discount_amount.cents(),
        total_cents: total.cents(),
    })
}

/// Checks a caller-declared total against the recomputed one.
///
/// `None` means the caller declared nothing and the recomputation stands.
pub fn verify_declared_total(
    computed: &OrderTotals,
    declared_total_cents: Option<i64>,
) -> Result<(), ValidationError> {
    match declared_total_cents {
        Some(declared) if declared != computed.total_cents => Err(ValidationError::NotAllowed {
            field: "total".to_string(),
            reason: format!(
                "declared total {} does not match computed total {}",
                declared, computed.total_cents
            ),
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DiscountKind;

    #[test]
    fn test_plain_line() {
        let line = price_line(250, 4, None).unwrap();
        assert_eq!(line.gross_cents, 1000);
        assert_eq!(line.discount_cents, 0);
        assert_eq!(line.subtotal_cents, 1000);
    }

    #[test]
    fn test_percentage_line_discount_rounds_half_up() {
        // 3 × 125 = 375, 10% = 37.5 -> 38
        let line = price_line(125, 3, Some(Discount::percentage(1000))).unwrap();
        assert_eq!(line.gross_cents, 375);
        assert_eq!(line.discount_cents, 38);
        assert_eq!(line.subtotal_cents, 337);
    }

    #[test]
    fn test_fixed_line_discount_caps_at_gross() {
        let line = price_line(100, 2, Some(Discount::fixed(9999))).unwrap();
        assert_eq!(line.discount_cents, 200);
        assert_eq!(line.subtotal_cents, 0);
    }

    #[test]
    fn test_order_totals_combined() {
        let lines = vec![
            price_line(500, 2, None).unwrap(),                             // 1000
            price_line(300, 5, Some(Discount::percentage(2000))).unwrap(), // 1500 - 300 = 1200
        ];
        let totals = order_totals(&lines, Discount::fixed(200)).unwrap();
        assert_eq!(totals.subtotal_cents, 2200);
        assert_eq!(totals.items_discount_cents, 300);
        assert_eq!(totals.order_discount_cents, 200);
        assert_eq!(totals.total_discount_cents, 500);
        assert_eq!(totals.total_cents, 2000);
    }

    #[test]
    fn test_order_percentage_discount_applies_to_discounted_subtotal() {
        let lines = vec![price_line(1000, 10, Some(Discount::fixed(1000))).unwrap()]; // 9000
        let totals = order_totals(&lines, Discount::percentage(500)).unwrap(); // 5% of 9000
        assert_eq!(totals.order_discount_cents, 450);
        assert_eq!(totals.total_cents, 8550);
    }

    #[test]
    fn test_empty_order_is_all_zero() {
        let totals = order_totals(&[], Discount::percentage(1000)).unwrap();
        assert_eq!(totals.subtotal_cents, 0);
        assert_eq!(totals.total_cents, 0);
    }

    #[test]
    fn test_declared_total_verification() {
        let lines = vec![price_line(500, 2, None).unwrap()];
        let totals = order_totals(&lines, Discount::none()).unwrap();

        assert!(verify_declared_total(&totals, None).is_ok());
        assert!(verify_declared_total(&totals, Some(1000)).is_ok());

        let err = verify_declared_total(&totals, Some(999)).unwrap_err();
        assert!(matches!(err, ValidationError::NotAllowed { .. }));
    }

    #[test]
    fn test_overflow_is_reported_not_wrapped() {
        let result = price_line(i64::MAX, 2, None);
        assert!(matches!(result, Err(CoreError::AmountOverflow { .. })));
    }

    #[test]
    fn test_totals_match_discount_kind_matrix() {
        for (kind, value, expected_order_discount) in [
            (DiscountKind::Percentage, 0, 0),
            (DiscountKind::Percentage, 10_000, 1000),
            (DiscountKind::Fixed, 400, 400),
            (DiscountKind::Fixed, 5000, 1000),
        ] {
            let lines = vec![price_line(100, 10, None).unwrap()];
            let totals = order_totals(&lines, Discount { kind, value }).unwrap();
            assert_eq!(totals.order_discount_cents, expected_order_discount);
            assert_eq!(totals.total_cents, 1000 - expected_order_discount);
        }
    }
}
