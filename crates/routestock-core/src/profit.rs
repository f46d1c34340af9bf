//! # Profit Derivation
//!
//! A sale's profit is `(price - cost) × quantity`, where cost is the
//! weighted-average historical unit cost from the stock ledger at the time
//! of sale (see [`crate::fifo::weighted_average_cost`]), falling back to
//! the product's reference cost when no receipt exists.
//!
//! The computation is deterministic for unchanged inputs, so persisting the
//! result and recomputing it later (the recalculation batch) is idempotent.

use crate::money::Money;

/// Profit of a sale in cents.
///
/// `unit_cost_cents` is fractional because the weighted average rarely
/// lands on a whole cent; the result is rounded to cents exactly once.
pub fn profit(price: Money, quantity: i64, unit_cost_cents: f64) -> Money {
    let per_unit = price.cents() as f64 - unit_cost_cents;
    Money::from_fractional_cents(per_unit * quantity as f64)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profit_basic() {
        // sold at 10.00, cost 7.00, 3 units → 9.00
        let p = profit(Money::from_cents(1000), 3, 700.0);
        assert_eq!(p.cents(), 900);
    }

    #[test]
    fn test_profit_fractional_cost_rounds_once() {
        // cost 333.33… over 3 units: 3 × (1000 - 333.3333) = 2000.0001 → 2000
        let p = profit(Money::from_cents(1000), 3, 1000.0 / 3.0);
        assert_eq!(p.cents(), 2000);
    }

    #[test]
    fn test_profit_can_be_negative() {
        let p = profit(Money::from_cents(500), 2, 700.0);
        assert_eq!(p.cents(), -400);
    }

    #[test]
    fn test_profit_deterministic() {
        let a = profit(Money::from_cents(1299), 7, 845.67);
        let b = profit(Money::from_cents(1299), 7, 845.67);
        assert_eq!(a, b);
    }
}
