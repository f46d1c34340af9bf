//! # Reconciliation Math
//!
//! Turns per-product loaded/sold/returned aggregates into a signed variance
//! and its monetary value.
//!
//! ## The Balance Equation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │   result = total_sold + total_returned - total_loaded               │
//! │                                                                     │
//! │   result = 0   →  balanced ("count OK")                             │
//! │   result < 0   →  shortage: stock left the vehicle unaccounted      │
//! │   result > 0   →  surplus: more came back than went out             │
//! │                                                                     │
//! │   All three terms are in PARENT units; child/variant quantities     │
//! │   are converted first and may leave a fractional part.              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reconciliation is read-only with respect to the ledgers: it aggregates
//! and reports, it never mutates `StockEntry` or `CarLoadItem` state.

use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Tolerance for treating a floating variance as zero or whole.
const EPSILON: f64 = 1e-9;

// =============================================================================
// Variance Types
// =============================================================================

/// Classification of a reconciliation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceKind {
    /// Count OK: loaded quantity fully accounted for.
    Balanced,
    /// Missing stock: a loss.
    Shortage,
    /// More accounted for than loaded.
    Surplus,
}

/// Per-product reconciliation line, in parent units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarianceLine {
    pub product_id: String,
    pub product_name: String,
    /// Authoritative loaded quantity from the vehicle ledger.
    pub total_loaded: f64,
    /// Direct parent sales plus converted child sales.
    pub total_sold: f64,
    /// Counted parent returns plus converted child returns.
    pub total_returned: f64,
    /// `total_sold + total_returned - total_loaded`, signed.
    pub result: f64,
    pub kind: VarianceKind,
    /// Monetary value of `result`, in cents (negative for a shortage).
    pub value_cents: i64,
}

/// First-variant pricing input for the fractional part of a variance.
#[derive(Debug, Clone, Copy)]
pub struct VariantPricing {
    /// Selling price of the first (oldest-created) variant, in cents.
    pub price_cents: i64,
    /// Variant units composing one parent unit.
    pub ratio: f64,
}

// =============================================================================
// Variance Computation
// =============================================================================

/// The signed reconciliation result in parent units.
#[inline]
pub fn variance_result(total_loaded: f64, total_sold: f64, total_returned: f64) -> f64 {
    total_sold + total_returned - total_loaded
}

/// Classifies a signed result.
pub fn classify(result: f64) -> VarianceKind {
    if result.abs() < EPSILON {
        VarianceKind::Balanced
    } else if result < 0.0 {
        VarianceKind::Shortage
    } else {
        VarianceKind::Surplus
    }
}

/// Monetary value of a signed variance, in cents.
///
/// A whole number of parent units is priced at the parent price. A
/// fractional part is priced using the **first variant's** price scaled by
/// the capacity ratio — the fraction of a parent unit expressed in variant
/// units, at the variant price. With several variants this is a documented
/// heuristic carried over from the source system, not a derived rule; with
/// no variant at all the parent price applies pro-rata.
pub fn monetary_value(
    result: f64,
    parent_price: Money,
    first_variant: Option<VariantPricing>,
) -> Money {
    let whole = result.trunc();
    let fraction = result - whole;

    let whole_cents = whole * parent_price.cents() as f64;
    let fraction_cents = if fraction.abs() < EPSILON {
        0.0
    } else {
        match first_variant {
            Some(pricing) => fraction * pricing.ratio * pricing.price_cents as f64,
            None => fraction * parent_price.cents() as f64,
        }
    };

    Money::from_fractional_cents(whole_cents + fraction_cents)
}

/// Packages the aggregates of one parent product into a variance line.
pub fn variance_line(
    product_id: impl Into<String>,
    product_name: impl Into<String>,
    total_loaded: f64,
    total_sold: f64,
    total_returned: f64,
    parent_price: Money,
    first_variant: Option<VariantPricing>,
) -> VarianceLine {
    let result = variance_result(total_loaded, total_sold, total_returned);
    VarianceLine {
        product_id: product_id.into(),
        product_name: product_name.into(),
        total_loaded,
        total_sold,
        total_returned,
        result,
        kind: classify(result),
        value_cents: monetary_value(result, parent_price, first_variant).cents(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
