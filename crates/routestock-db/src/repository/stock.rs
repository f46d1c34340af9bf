//! # Stock Ledger Repository
//!
//! The warehouse FIFO cost ledger.
//!
//! ## Ledger Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │               stock_entries (per product, oldest first)             │
//! │                                                                     │
//! │  receipt 01 Jan: quantity 10 @ 7.00, quantity_left 0                │
//! │  receipt 15 Jan: quantity 20 @ 7.50, quantity_left 12  ◄── next     │
//! │  receipt 02 Feb: quantity 10 @ 8.00, quantity_left 10      FIFO     │
//! │                                                                     │
//! │  stock_available = Σ quantity_left            (here: 22)            │
//! │  stock_value     = Σ quantity_left × price    (here: 170.00)        │
//! │                                                                     │
//! │  weighted_average_cost uses the FULL quantity of every entry        │
//! │  at-or-before the as-of instant, not the remaining balance:         │
//! │  profit approximates the average historical unit cost rather        │
//! │  than tracing the exact FIFO unit sold.                             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use routestock_core::fifo::{self, FifoSlice};
use routestock_core::validation::{validate_price_cents, validate_quantity};
use routestock_core::{CoreError, StockEntry};

/// Repository for warehouse stock ledger operations.
#[derive(Debug, Clone)]
pub struct StockLedgerRepository {
    pool: SqlitePool,
}

impl StockLedgerRepository {
    /// Creates a new StockLedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockLedgerRepository { pool }
    }

    /// Records a purchase receipt as a new ledger entry.
    ///
    /// Entries are never merged with prior receipts: distinct receipts
    /// stay distinct for audit and FIFO accuracy. `quantity_left` starts
    /// equal to `quantity`.
    pub async fn receive(
        &self,
        product_id: &str,
        quantity: i64,
        unit_price_cents: i64,
        at: DateTime<Utc>,
    ) -> DbResult<StockEntry> {
        validate_quantity(quantity).map_err(CoreError::from)?;
        validate_price_cents(unit_price_cents).map_err(CoreError::from)?;

        let exists: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE id = ?1 AND is_active = 1")
                .bind(product_id)
                .fetch_one(&self.pool)
                .await?;
        if exists == 0 {
            return Err(CoreError::not_found("Product", product_id).into());
        }

        let entry = StockEntry {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            quantity,
            quantity_left: quantity,
            unit_price_cents,
            created_at: at,
        };

        debug!(
            product_id = %product_id,
            quantity = %quantity,
            unit_price_cents = %unit_price_cents,
            "Receiving stock"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_entries (
                id, product_id, quantity, quantity_left, unit_price_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.product_id)
        .bind(entry.quantity)
        .bind(entry.quantity_left)
        .bind(entry.unit_price_cents)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(entry)
    }

    /// All ledger entries for a product, oldest first.
    pub async fn entries(&self, product_id: &str) -> DbResult<Vec<StockEntry>> {
        let entries = sqlx::query_as::<_, StockEntry>(
            r#"
            SELECT id, product_id, quantity, quantity_left, unit_price_cents, created_at
            FROM stock_entries
            WHERE product_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Consumes warehouse stock FIFO (oldest entry first).
    ///
    /// Used by stock movements out of the warehouse. Atomic: the whole
    /// request is either satisfiable or the operation fails with
    /// `InsufficientStock` and no entry is touched.
    pub async fn consume(&self, product_id: &str, quantity: i64) -> DbResult<()> {
        validate_quantity(quantity).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;

        let slices: Vec<FifoSlice> = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT id, quantity_left FROM stock_entries
            WHERE product_id = ?1 AND quantity_left > 0
            ORDER BY created_at, id
            "#,
        )
        .bind(product_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|(id, quantity_left)| FifoSlice { id, quantity_left })
        .collect();

        let takes = fifo::plan_decrease(product_id, &slices, quantity)?;

        for take in takes {
            sqlx::query("UPDATE stock_entries SET quantity_left = quantity_left - ?2 WHERE id = ?1")
                .bind(&take.id)
                .bind(take.amount)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!(product_id = %product_id, quantity = %quantity, "Consumed warehouse stock");
        Ok(())
    }

    /// Weighted-average historical unit cost at an instant, in cents.
    ///
    /// Considers every entry with `created_at ≤ as_of` at its full
    /// received quantity. Falls back to the product's reference
    /// `cost_cents` when no entry exists — a product sold before its
    /// first receipt still gets a plausible cost.
    pub async fn weighted_average_cost(
        &self,
        product_id: &str,
        as_of: DateTime<Utc>,
    ) -> DbResult<f64> {
        let entries: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT quantity, unit_price_cents FROM stock_entries
            WHERE product_id = ?1 AND created_at <= ?2
            "#,
        )
        .bind(product_id)
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;

        if let Some(cost) = fifo::weighted_average_cost(&entries) {
            return Ok(cost);
        }

        let fallback: Option<i64> = sqlx::query_scalar("SELECT cost_cents FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        match fallback {
            Some(cost_cents) => Ok(cost_cents as f64),
            None => Err(CoreError::not_found("Product", product_id).into()),
        }
    }

    /// Global warehouse availability: Σ `quantity_left` for the product,
    /// independent of any vehicle.
    pub async fn stock_available(&self, product_id: &str) -> DbResult<i64> {
        let total: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(quantity_left) FROM stock_entries WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(0))
    }

    /// Remaining stock value: Σ `quantity_left × unit_price`, in cents.
    pub async fn stock_value_cents(&self, product_id: &str) -> DbResult<i64> {
        let total: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(quantity_left * unit_price_cents) FROM stock_entries WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(0))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
