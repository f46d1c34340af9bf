//! # FIFO Planning
//!
//! Pure planning functions over ledger row snapshots.
//!
//! ## Plan, Then Apply
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │              How a Ledger Mutation Stays Atomic                     │
//! │                                                                     │
//! │  routestock-db transaction                                          │
//! │       │                                                             │
//! │       ├── 1. Read the FIFO rows (ordered) inside the transaction    │
//! │       │                                                             │
//! │       ├── 2. plan_decrease / plan_increase  ← THIS MODULE           │
//! │       │       pure, no I/O — either a full plan or an error,        │
//! │       │       never a partial one                                   │
//! │       │                                                             │
//! │       ├── 3. Apply every take as an UPDATE                          │
//! │       │                                                             │
//! │       └── 4. Commit (or roll back on any failure)                   │
//! │                                                                     │
//! │  InsufficientStock aborts at step 2: no row was touched.            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Slice Snapshots
// =============================================================================

/// A consumable ledger row snapshot, in FIFO order (oldest first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FifoSlice {
    pub id: String,
    pub quantity_left: i64,
}

/// A refillable ledger row snapshot, newest-first, with its refill ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefillSlice {
    pub id: String,
    pub quantity_left: i64,
    /// `quantity_loaded`: `quantity_left` can never be raised above this.
    pub quantity_loaded: i64,
}

/// One planned mutation: deduct or add `amount` on row `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FifoTake {
    pub id: String,
    pub amount: i64,
}

// =============================================================================
// Decrease (oldest first, all-or-nothing)
// =============================================================================

/// Plans a FIFO consumption of `requested` units across `slices`.
///
/// `slices` must be ordered oldest-first (`loaded_at` ascending for the
/// vehicle ledger, `created_at` ascending for the warehouse ledger). Each
/// slice contributes `min(remaining, quantity_left)` until the request is
/// satisfied.
///
/// Fails with `InsufficientStock` when the summed balance cannot cover the
/// request. No partial plan is ever returned.
pub fn plan_decrease(product: &str, slices: &[FifoSlice], requested: i64) -> CoreResult<Vec<FifoTake>> {
    let available: i64 = slices.iter().map(|s| s.quantity_left).sum();
    if available < requested {
        return Err(CoreError::InsufficientStock {
            product: product.to_string(),
            available,
            requested,
        });
    }

    let mut remaining = requested;
    let mut takes = Vec::new();
    for slice in slices {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(slice.quantity_left);
        if take > 0 {
            takes.push(FifoTake {
                id: slice.id.clone(),
                amount: take,
            });
            remaining -= take;
        }
    }

    Ok(takes)
}

// =============================================================================
// Increase (newest first, capped at the loaded ceiling)
// =============================================================================

/// Plans a return/cancellation refill of `requested` units.
///
/// `slices` must be ordered newest-first (`loaded_at` descending). The
/// newest item absorbs the return up to its `quantity_loaded` ceiling;
/// anything beyond spills into progressively older items.
///
/// Returns the plan together with the excess that no item could absorb.
/// Callers must treat a non-zero excess as a failure and apply nothing.
pub fn plan_increase(slices: &[RefillSlice], requested: i64) -> (Vec<FifoTake>, i64) {
    let mut remaining = requested;
    let mut takes = Vec::new();
    for slice in slices {
        if remaining == 0 {
            break;
        }
        let headroom = slice.quantity_loaded - slice.quantity_left;
        let add = remaining.min(headroom);
        if add > 0 {
            takes.push(FifoTake {
                id: slice.id.clone(),
                amount: add,
            });
            remaining -= add;
        }
    }
    (takes, remaining)
}

// =============================================================================
// Weighted-Average Cost
// =============================================================================

/// Weighted-average unit cost over receipt entries, in fractional cents.
///
/// Uses the **full historical quantity** of every entry, not the remaining
/// balance: profit approximates "what this unit cost on average" rather
/// than tracing the exact FIFO unit sold. Returns `None` when there are no
/// entries (callers fall back to the product's reference cost).
pub fn weighted_average_cost(entries: &[(i64, i64)]) -> Option<f64> {
    let total_quantity: i64 = entries.iter().map(|(quantity, _)| quantity).sum();
    if total_quantity == 0 {
        return None;
    }
    let total_value: i64 = entries
        .iter()
        .map(|(quantity, unit_price_cents)| quantity * unit_price_cents)
        .sum();
    Some(total_value as f64 / total_quantity as f64)
}

// =============================================================================
// Unit Tests
// =============================================================================
