//! # Domain Types
//!
//! Core domain types for the stock and car-load reconciliation engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                │
//! │                                                                     │
//! │  ┌───────────────┐   ┌───────────────┐   ┌────────────────────┐    │
//! │  │   Product     │   │  StockEntry   │   │     CarLoad        │    │
//! │  │ ───────────── │   │ ───────────── │   │ ────────────────── │    │
//! │  │ id (UUID)     │   │ quantity      │   │ status             │    │
//! │  │ kind          │   │ quantity_left │   │ load/return date   │    │
//! │  │ price_cents   │   │ unit_price    │   │ previous_car_load  │    │
//! │  └───────────────┘   │ created_at ◄──┼───┼── FIFO order       │    │
//! │                      └───────────────┘   └─────────┬──────────┘    │
//! │                                                    │               │
//! │  ┌───────────────┐   ┌─────────────────┐  ┌────────┴──────────┐    │
//! │  │     Sale      │   │ CarLoadInventory│  │   CarLoadItem     │    │
//! │  │ ───────────── │   │ + its items     │  │ ───────────────── │    │
//! │  │ kind          │   │ (reconciliation │  │ quantity_loaded   │    │
//! │  │ profit_cents  │   │  snapshot)      │  │ quantity_left     │    │
//! │  └───────────────┘   └─────────────────┘  │ loaded_at ◄─ FIFO │    │
//! │                                           └───────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Parent/Variant Modeling
//! A product is either a base product (the unit warehouse stock is measured
//! in, e.g. a carton) or a variant of exactly one base product (a sub-unit
//! sold individually, e.g. a pack). The tagged `ProductKind` enum makes
//! "variants never themselves have variants" structural: a `Variant` can
//! only name a parent id, never carry children.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// Whether a product is a base unit or a sellable sub-unit of one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProductKind {
    /// A base/parent product. Warehouse stock and vehicle loads are
    /// primarily measured in this unit.
    Base {
        /// How many atomic units one base unit represents.
        base_quantity: i64,
    },
    /// A variant sold individually but expressible as a fraction of its
    /// parent via `base_quantity` ratios.
    Variant {
        /// The base product this variant belongs to.
        parent_id: String,
        /// Atomic units one variant unit represents, relative to the
        /// parent's `base_quantity`.
        base_quantity: i64,
    },
}

/// A product in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    /// Selling price in cents.
    pub price_cents: i64,

    /// Reference cost in cents. Fallback for profit computation when the
    /// stock ledger has no entries for the product.
    pub cost_cents: i64,

    /// Base product or variant of one.
    pub kind: ProductKind,

    /// Whether the product is active (soft delete).
    pub is_active: bool,

    /// When the product was created. Variant creation order decides which
    /// variant is "first" for fractional variance pricing.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the selling price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the reference cost as Money.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    /// Returns the atomic-unit capacity of one unit of this product.
    #[inline]
    pub fn base_quantity(&self) -> i64 {
        match self.kind {
            ProductKind::Base { base_quantity } => base_quantity,
            ProductKind::Variant { base_quantity, .. } => base_quantity,
        }
    }

    /// Returns the parent product id, or None for a base product.
    pub fn parent_id(&self) -> Option<&str> {
        match &self.kind {
            ProductKind::Base { .. } => None,
            ProductKind::Variant { parent_id, .. } => Some(parent_id),
        }
    }

    /// True when the product is a variant of a base product.
    #[inline]
    pub fn is_variant(&self) -> bool {
        matches!(self.kind, ProductKind::Variant { .. })
    }
}

// =============================================================================
// Stock Entry (warehouse cost ledger)
// =============================================================================

/// An immutable warehouse receipt line.
///
/// Entries are never merged: distinct receipts stay distinct for audit and
/// FIFO accuracy. `created_at` defines the FIFO order, oldest first.
///
/// Invariant: `0 ≤ quantity_left ≤ quantity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockEntry {
    pub id: String,
    pub product_id: String,
    /// Quantity received. Immutable after creation.
    pub quantity: i64,
    /// Remaining consumable balance. Monotonically non-increasing except
    /// for explicit reversals.
    pub quantity_left: i64,
    /// Unit cost at receipt, in cents.
    pub unit_price_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl StockEntry {
    /// Returns the unit cost as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }
}

// =============================================================================
// Car Load
// =============================================================================

/// Lifecycle stage of a car-load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum CarLoadStatus {
    /// Being assembled; items can be added/edited, the load can be deleted.
    Loading,
    /// Out in the field; sales consume the vehicle ledger.
    Active,
    /// Returned. Terminal: item mutation is forbidden.
    Unloaded,
}

impl CarLoadStatus {
    /// Whether item mutation (load, add, update, delete) is legal.
    #[inline]
    pub const fn items_mutable(&self) -> bool {
        !matches!(self, CarLoadStatus::Unloaded)
    }

    /// Whether the state machine allows moving to `next`.
    pub const fn can_transition_to(&self, next: CarLoadStatus) -> bool {
        matches!(
            (self, next),
            (CarLoadStatus::Loading, CarLoadStatus::Active)
                | (CarLoadStatus::Active, CarLoadStatus::Unloaded)
        )
    }
}

impl Default for CarLoadStatus {
    fn default() -> Self {
        CarLoadStatus::Loading
    }
}

/// A loading event for a vehicle/team.
///
/// Consecutive loads chain via `previous_car_load_id` so leftover stock can
/// roll forward without re-keying it manually.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CarLoad {
    pub id: String,
    pub name: String,
    pub status: CarLoadStatus,
    /// Team/vehicle the load belongs to.
    pub team: Option<String>,
    /// Set when the load transitions LOADING → ACTIVE.
    pub load_date: Option<DateTime<Utc>>,
    /// Set when the load transitions ACTIVE → UNLOADED.
    pub return_date: Option<DateTime<Utc>>,
    pub previous_car_load_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Car Load Item (vehicle stock ledger)
// =============================================================================

/// A vehicle-stock-ledger entry.
///
/// `loaded_at` is the FIFO order key: sales consume the oldest item first,
/// returns refill the newest first.
///
/// Invariant: `0 ≤ quantity_left ≤ quantity_loaded`. The sum of
/// `quantity_left` across a car-load's items for a product is that
/// product's available stock in the vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CarLoadItem {
    pub id: String,
    pub car_load_id: String,
    pub product_id: String,
    pub quantity_loaded: i64,
    pub quantity_left: i64,
    pub loaded_at: DateTime<Utc>,
    /// Marks carry-over stock rolled forward from the previous car-load.
    pub from_previous: bool,
}

// =============================================================================
// Car Load Inventory (reconciliation snapshot)
// =============================================================================

/// A reconciliation snapshot for a car-load.
///
/// Only an unclosed inventory is actionable; closing freezes its items but
/// never alters physical stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CarLoadInventory {
    pub id: String,
    pub car_load_id: String,
    pub name: String,
    pub closed: bool,
    pub author: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A per-product reconciliation line.
///
/// Variant products get sibling rows referencing the variant product, not a
/// nested structure — aggregation to parent units happens at read time.
/// `total_sold` may carry fractional parent units from child conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CarLoadInventoryItem {
    pub id: String,
    pub inventory_id: String,
    pub product_id: String,
    pub total_loaded: f64,
    pub total_sold: f64,
    /// Counted returns, entered by the inventory author, in the product's
    /// own unit.
    pub total_returned: i64,
    pub total_loaded_from_previous: f64,
    pub comment: Option<String>,
}

// =============================================================================
// Sale
// =============================================================================

/// How a sale was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SaleKind {
    /// An ordinary counter sale. Legacy behavior: does not consume the
    /// vehicle stock ledger.
    Single,
    /// A sale line on a sales invoice, drawn from a car-load.
    InvoiceItem,
}

/// A recorded field sale.
///
/// The relationship to the ledgers is behavioral, not a foreign key: a sale
/// consumes ledger quantity via the car-load repository, not via ownership.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    pub product_id: String,
    /// The car-load the sale was made from, when known.
    pub car_load_id: Option<String>,
    pub kind: SaleKind,
    pub quantity: i64,
    /// Unit selling price in cents.
    pub price_cents: i64,
    /// Derived profit, persisted. Recomputable idempotently.
    pub profit_cents: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Returns the unit price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
