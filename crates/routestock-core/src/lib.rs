//! # routestock-core: Pure Business Logic for Routestock
//!
//! This crate is the **heart** of the stock & car-load reconciliation
//! engine. It contains all business logic as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Routestock Architecture                          │
//! │                                                                     │
//! │  ┌─────────────────────────────────────────────────────────────┐    │
//! │  │          Back-office CRUD / reporting layer                 │    │
//! │  │                  (out of scope here)                        │    │
//! │  └────────────────────────────┬────────────────────────────────┘    │
//! │                               │                                     │
//! │  ┌────────────────────────────▼────────────────────────────────┐    │
//! │  │            ★ routestock-core (THIS CRATE) ★                 │    │
//! │  │                                                             │    │
//! │  │  ┌─────────┐ ┌─────────┐ ┌───────────┐ ┌─────────────────┐  │    │
//! │  │  │  types  │ │  fifo   │ │  convert  │ │    reconcile    │  │    │
//! │  │  │ Product │ │ plans   │ │ parent ⇄  │ │ variance + its  │  │    │
//! │  │  │ CarLoad │ │ WAC     │ │ variant   │ │ monetary value  │  │    │
//! │  │  └─────────┘ └─────────┘ └───────────┘ └─────────────────┘  │    │
//! │  │                                                             │    │
//! │  │  NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS         │    │
//! │  └────────────────────────────┬────────────────────────────────┘    │
//! │                               │                                     │
//! │  ┌────────────────────────────▼────────────────────────────────┐    │
//! │  │             routestock-db (Database Layer)                  │    │
//! │  │      SQLite ledgers, transactions, migrations               │    │
//! │  └─────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, StockEntry, CarLoad, Sale, …)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`convert`] - Parent/variant unit conversion
//! - [`fifo`] - FIFO consumption/refill planning and weighted-average cost
//! - [`reconcile`] - Inventory variance math
//! - [`profit`] - Sale profit derivation
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every function is deterministic
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: stored monetary values are cents (i64); fractional
//!    parent-unit math is f64 and rounds to cents once, at the boundary
//! 4. **Explicit Errors**: all errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use routestock_core::fifo::{plan_decrease, FifoSlice};
//!
//! // Two vehicle-ledger items, oldest first: 10 left and 8 left.
//! let slices = vec![
//!     FifoSlice { id: "older".into(), quantity_left: 10 },
//!     FifoSlice { id: "newer".into(), quantity_left: 8 },
//! ];
//!
//! // A sale of 12 drains the older item and takes 2 from the newer.
//! let takes = plan_decrease("carton", &slices, 12).unwrap();
//! assert_eq!(takes[0].amount, 10);
//! assert_eq!(takes[1].amount, 2);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod convert;
pub mod error;
pub mod fifo;
pub mod money;
pub mod profit;
pub mod reconcile;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use routestock_core::Money` instead of
// `use routestock_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;
