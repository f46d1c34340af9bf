//! # Unit Conversion
//!
//! Parent/variant quantity conversion for the product catalog.
//!
//! ## The Capacity Ratio
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  ratio = parent.base_quantity / variant.base_quantity               │
//! │                                                                     │
//! │  Example: carton base_quantity = 1000, pack base_quantity = 20      │
//! │           ratio = 50 → 50 packs compose one carton                  │
//! │                                                                     │
//! │  to_parent_units(120 packs)      → 3 cartons, remainder 30 packs    │
//! │                                    of capacity in the last carton   │
//! │  to_parent_equivalent(6 packs)   → 0.12 cartons (fractional,        │
//! │                                    exact — used by reconciliation)  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both forms are needed by different callers: whole-unit counts for
//! physical handling, fractional parent equivalents wherever a summed
//! quantity or monetary result must stay decimal.
//!
//! A `base_quantity` of zero would divide by zero here; product creation
//! rejects it, and these functions re-check defensively.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::Product;

/// Result of converting a variant quantity into whole parent units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParentConversion {
    /// Whole parent units needed to cover the quantity (ceiling).
    pub parent_units: i64,
    /// Remaining variant-equivalent capacity in the last, partially
    /// consumed parent unit. Equals the quantity itself when no
    /// conversion applies.
    pub remainder: f64,
}

/// Variant units composing one parent unit.
///
/// Fails with `InvalidConfiguration` when either `base_quantity` is not
/// strictly positive or when `variant` does not belong to `parent`.
pub fn capacity_ratio(parent: &Product, variant: &Product) -> CoreResult<f64> {
    if parent.base_quantity() <= 0 {
        return Err(CoreError::invalid_configuration(
            &parent.id,
            "base_quantity must be positive",
        ));
    }
    if variant.base_quantity() <= 0 {
        return Err(CoreError::invalid_configuration(
            &variant.id,
            "base_quantity must be positive",
        ));
    }
    match variant.parent_id() {
        Some(parent_id) if parent_id == parent.id => {
            Ok(parent.base_quantity() as f64 / variant.base_quantity() as f64)
        }
        Some(parent_id) => Err(CoreError::invalid_configuration(
            &variant.id,
            format!("is a variant of {parent_id}, not of {}", parent.id),
        )),
        None => Err(CoreError::invalid_configuration(
            &variant.id,
            "is not a variant, no conversion applies",
        )),
    }
}

/// Converts a variant quantity into whole parent units plus the leftover
/// capacity of the last parent unit.
///
/// A base product converts to `{0, quantity}` unchanged — there is no
/// parent to express it in.
pub fn to_parent_units(parent: &Product, variant: &Product, quantity: i64) -> CoreResult<ParentConversion> {
    if variant.parent_id().is_none() {
        return Ok(ParentConversion {
            parent_units: 0,
            remainder: quantity as f64,
        });
    }

    let ratio = capacity_ratio(parent, variant)?;
    let parent_units = (quantity as f64 / ratio).ceil() as i64;
    let remainder = parent_units as f64 * ratio - quantity as f64;

    Ok(ParentConversion {
        parent_units,
        remainder,
    })
}

/// Fractional parent-unit equivalent of a variant quantity.
///
/// `to_parent_equivalent(quantity) = quantity / ratio` exactly; a base
/// product passes through unchanged. Reconciliation sums these, so the
/// value stays decimal (fractional cartons are meaningful there).
pub fn to_parent_equivalent(parent: &Product, variant: &Product, quantity: f64) -> CoreResult<f64> {
    if variant.parent_id().is_none() {
        return Ok(quantity);
    }
    let ratio = capacity_ratio(parent, variant)?;
    Ok(quantity / ratio)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProductKind;
    use chrono::Utc;

    fn product(id: &str, kind: ProductKind) -> Product {
        let now = Utc::now();
        Product {
            id: id.to_string(),
            name: id.to_string(),
            price_cents: 1000,
            cost_cents: 700,
            kind,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn carton_and_pack(parent_bq: i64, child_bq: i64) -> (Product, Product) {
        let parent = product("carton", ProductKind::Base { base_quantity: parent_bq });
        let child = product(
            "pack",
            ProductKind::Variant {
                parent_id: "carton".to_string(),
                base_quantity: child_bq,
            },
        );
        (parent, child)
    }

    #[test]
    fn test_capacity_ratio() {
        let (parent, child) = carton_and_pack(1000, 20);
        assert_eq!(capacity_ratio(&parent, &child).unwrap(), 50.0);
    }

    #[test]
    fn test_to_parent_units_exact() {
        let (parent, child) = carton_and_pack(1000, 20);
        let conv = to_parent_units(&parent, &child, 100).unwrap();
        assert_eq!(conv.parent_units, 2);
        assert_eq!(conv.remainder, 0.0);
    }

    #[test]
    fn test_to_parent_units_partial() {
        let (parent, child) = carton_and_pack(1000, 20);
        // 120 packs → 3 cartons, with 30 packs of capacity left in the third
        let conv = to_parent_units(&parent, &child, 120).unwrap();
        assert_eq!(conv.parent_units, 3);
        assert_eq!(conv.remainder, 30.0);
    }

    #[test]
    fn test_to_parent_equivalent_fractional() {
        let (parent, child) = carton_and_pack(1000, 20);
        assert_eq!(to_parent_equivalent(&parent, &child, 6.0).unwrap(), 0.12);
    }

    #[test]
    fn test_to_parent_equivalent_integer_divisible() {
        // ratio 2: 6 child units are exactly 3 parent units
        let (parent, child) = carton_and_pack(12, 6);
        assert_eq!(to_parent_equivalent(&parent, &child, 6.0).unwrap(), 3.0);
    }

    #[test]
    fn test_base_product_passes_through() {
        let (parent, _) = carton_and_pack(1000, 20);
        let conv = to_parent_units(&parent, &parent, 7).unwrap();
        assert_eq!(conv.parent_units, 0);
        assert_eq!(conv.remainder, 7.0);
        assert_eq!(to_parent_equivalent(&parent, &parent, 7.0).unwrap(), 7.0);
    }

    #[test]
    fn test_zero_base_quantity_rejected() {
        let (parent, child) = carton_and_pack(0, 20);
        let err = capacity_ratio(&parent, &child).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfiguration { .. }));

        let (parent, child) = carton_and_pack(1000, 0);
        assert!(capacity_ratio(&parent, &child).is_err());
    }

    #[test]
    fn test_wrong_parent_rejected() {
        let (_, child) = carton_and_pack(1000, 20);
        let other = product("crate", ProductKind::Base { base_quantity: 500 });
        assert!(capacity_ratio(&other, &child).is_err());
    }
}
