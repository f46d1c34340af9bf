//! # Error Types
//!
//! Domain-specific error types for routestock-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                 │
//! │                                                                     │
//! │  routestock-core errors (this file)                                 │
//! │  ├── CoreError        - Ledger / lifecycle / configuration errors   │
//! │  └── ValidationError  - Input validation failures                   │
//! │                                                                     │
//! │  routestock-db errors (separate crate)                              │
//! │  └── DbError          - Database operation failures                 │
//! │                                                                     │
//! │  Flow: ValidationError → CoreError → DbError → caller               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, quantities, states)
//! 3. Errors are enum variants, never String
//! 4. Ledger failures are reported before any row is mutated

use thiserror::Error;

use crate::types::CarLoadStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent ledger, lifecycle, or configuration rule violations.
/// Callers must treat them as typed failures; nothing is partially applied
/// when one of these is returned.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A FIFO decrease request exceeds the available balance.
    ///
    /// ## When This Occurs
    /// - A sale consumes more of a product than the car-load still carries
    ///
    /// The operation is atomic: when this is returned, no item was touched.
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// A lifecycle rule forbids the requested operation.
    ///
    /// ## When This Occurs
    /// - Mutating items of an UNLOADED car-load
    /// - Activating a car-load with no items
    /// - Deleting a car-load that already left LOADING
    /// - Returning more than was ever loaded
    #[error("Car-load {car_load} is {status:?}: {reason}")]
    InvalidState {
        car_load: String,
        status: CarLoadStatus,
        reason: String,
    },

    /// A product is configured in a way that makes conversion impossible.
    ///
    /// ## When This Occurs
    /// - `base_quantity` of zero or less on a parent or variant
    /// - A variant referencing a parent that is itself a variant
    ///
    /// Rejected at product-creation time; conversion re-checks defensively.
    #[error("Invalid configuration for {product}: {reason}")]
    InvalidConfiguration { product: String, reason: String },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and id.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an InvalidConfiguration error.
    pub fn invalid_configuration(product: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidConfiguration {
            product: product.into(),
            reason: reason.into(),
        }
    }

    /// Creates an InvalidState error.
    pub fn invalid_state(
        car_load: impl Into<String>,
        status: CarLoadStatus,
        reason: impl Into<String>,
    ) -> Self {
        CoreError::InvalidState {
            car_load: car_load.into(),
            status,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
