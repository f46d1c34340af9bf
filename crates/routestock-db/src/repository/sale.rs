//! # Sale Repository
//!
//! Sale recording, profit derivation, and the profit recalculation batch.
//!
//! ## Ledger Coupling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                 What a Sale Does To The Ledgers                     │
//! │                                                                     │
//! │  SaleKind::InvoiceItem + car_load ──► decrease vehicle ledger FIFO  │
//! │  SaleKind::Single                 ──► ledgers untouched             │
//! │                                                                     │
//! │  A SINGLE sale may still reference a car-load: reconciliation       │
//! │  counts it as sold from that load even though the physical ledger   │
//! │  was never decremented. Carried over from the source system —       │
//! │  the inventory variance is where the asymmetry becomes visible.     │
//! │                                                                     │
//! │  profit = (price - weighted_average_cost(at sale time)) × quantity  │
//! │  Recomputing with unchanged receipts gives the same cents, so the   │
//! │  recalculation batch is idempotent.                                 │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::car_load::CarLoadRepository;
use crate::repository::product::ProductRepository;
use crate::repository::stock::StockLedgerRepository;
use routestock_core::profit;
use routestock_core::validation::{validate_price_cents, validate_quantity};
use routestock_core::{CoreError, Money, Sale, SaleKind};

/// Outcome of a profit recalculation batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecalcSummary {
    pub updated: usize,
    pub failed: usize,
}

/// Repository for sale operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

const SELECT_SALE: &str = r#"
    SELECT id, product_id, car_load_id, kind, quantity, price_cents,
           profit_cents, created_at, updated_at
    FROM sales
"#;

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Records a sale.
    ///
    /// Invoice-item sales drawn from a car-load consume its vehicle ledger
    /// FIFO before the sale row is written; an `InsufficientStock` failure
    /// there records nothing. Profit is derived from the stock ledger's
    /// weighted-average cost at the time of sale and persisted.
    pub async fn record(
        &self,
        product_id: &str,
        car_load_id: Option<&str>,
        kind: SaleKind,
        quantity: i64,
        price_cents: i64,
    ) -> DbResult<Sale> {
        validate_quantity(quantity).map_err(CoreError::from)?;
        validate_price_cents(price_cents).map_err(CoreError::from)?;

        let product = ProductRepository::new(self.pool.clone())
            .get_required(product_id)
            .await?;

        if kind == SaleKind::InvoiceItem {
            if let Some(car_load_id) = car_load_id {
                CarLoadRepository::new(self.pool.clone())
                    .decrease(car_load_id, product_id, quantity)
                    .await?;
            }
        }

        let now = Utc::now();
        let unit_cost = StockLedgerRepository::new(self.pool.clone())
            .weighted_average_cost(product_id, now)
            .await?;
        let profit_cents = profit::profit(Money::from_cents(price_cents), quantity, unit_cost);

        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            product_id: product.id,
            car_load_id: car_load_id.map(str::to_string),
            kind,
            quantity,
            price_cents,
            profit_cents: Some(profit_cents.cents()),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, product_id, car_load_id, kind, quantity, price_cents,
                profit_cents, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.product_id)
        .bind(&sale.car_load_id)
        .bind(sale.kind)
        .bind(sale.quantity)
        .bind(sale.price_cents)
        .bind(sale.profit_cents)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(
            id = %sale.id,
            product_id = %product_id,
            quantity = %quantity,
            profit_cents = %profit_cents.cents(),
            "Recorded sale"
        );
        Ok(sale)
    }

    /// Gets a sale by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!("{SELECT_SALE} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// All sales attributed to a car-load, oldest first.
    pub async fn for_car_load(&self, car_load_id: &str) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "{SELECT_SALE} WHERE car_load_id = ?1 ORDER BY created_at, id"
        ))
        .bind(car_load_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Recomputes and persists the profit of every sale.
    ///
    /// Each sale's cost is re-derived as of its own `created_at`, so an
    /// unchanged ledger reproduces the stored cents exactly. One failing
    /// sale is logged and skipped; the batch continues.
    pub async fn recalculate_all_profits(&self) -> DbResult<RecalcSummary> {
        let sales = sqlx::query_as::<_, Sale>(&format!("{SELECT_SALE} ORDER BY created_at, id"))
            .fetch_all(&self.pool)
            .await?;

        info!(total = sales.len(), "Recalculating sale profits");

        let stock = StockLedgerRepository::new(self.pool.clone());
        let mut summary = RecalcSummary::default();

        for sale in sales {
            let result = async {
                let unit_cost = stock
                    .weighted_average_cost(&sale.product_id, sale.created_at)
                    .await?;
                let profit_cents =
                    profit::profit(sale.price(), sale.quantity, unit_cost).cents();

                sqlx::query("UPDATE sales SET profit_cents = ?2, updated_at = ?3 WHERE id = ?1")
                    .bind(&sale.id)
                    .bind(profit_cents)
                    .bind(Utc::now())
                    .execute(&self.pool)
                    .await?;
                DbResult::Ok(())
            }
            .await;

            match result {
                Ok(()) => summary.updated += 1,
                Err(err) => {
                    warn!(sale_id = %sale.id, error = %err, "Profit recalculation failed for sale");
                    summary.failed += 1;
                }
            }
        }

        info!(
            updated = summary.updated,
            failed = summary.failed,
            "Profit recalculation finished"
        );
        Ok(summary)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use routestock_core::{Product, ProductKind};

    async fn db_with_product() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        let product = Product {
            id: "carton".to_string(),
            name: "Carton".to_string(),
            price_cents: 10_000,
            cost_cents: 7_000,
            kind: ProductKind::Base { base_quantity: 1000 },
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap();
        db
    }

    async fn active_load(db: &Database, cartons: i64) -> String {
        let load = db.car_loads().create("Tour 12", None).await.unwrap();
        db.car_loads().add_item(&load.id, "carton", cartons).await.unwrap();
        db.car_loads().activate(&load.id).await.unwrap();
        load.id
    }

    #[tokio::test]
    async fn test_invoice_sale_consumes_vehicle_ledger() {
        let db = db_with_product().await;
        let load_id = active_load(&db, 10).await;

        db.sales()
            .record("carton", Some(&load_id), SaleKind::InvoiceItem, 4, 10_000)
            .await
            .unwrap();

        assert_eq!(db.car_loads().available(&load_id, "carton").await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_single_sale_leaves_ledger_untouched() {
        let db = db_with_product().await;
        let load_id = active_load(&db, 10).await;

        // Attributed to the load but recorded as a counter sale: the
        // physical ledger stays at 10. The mismatch surfaces at inventory
        // reconciliation, not here.
        db.sales()
            .record("carton", Some(&load_id), SaleKind::Single, 4, 10_000)
            .await
            .unwrap();

        assert_eq!(db.car_loads().available(&load_id, "carton").await.unwrap(), 10);
        assert_eq!(db.sales().for_car_load(&load_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_ledger_records_nothing() {
        let db = db_with_product().await;
        let load_id = active_load(&db, 3).await;

        let err = db
            .sales()
            .record("carton", Some(&load_id), SaleKind::InvoiceItem, 5, 10_000)
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InsufficientStock { .. })
        ));
        assert!(db.sales().for_car_load(&load_id).await.unwrap().is_empty());
        assert_eq!(db.car_loads().available(&load_id, "carton").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_profit_uses_weighted_average_cost() {
        let db = db_with_product().await;
        let earlier = Utc::now() - chrono::Duration::days(1);
        db.stock().receive("carton", 10, 100, earlier).await.unwrap();
        db.stock().receive("carton", 10, 200, earlier).await.unwrap();

        // WAC 150; (1000 - 150) × 2 = 1700
        let sale = db
            .sales()
            .record("carton", None, SaleKind::Single, 2, 1_000)
            .await
            .unwrap();
        assert_eq!(sale.profit_cents, Some(1_700));
    }

    #[tokio::test]
    async fn test_profit_falls_back_to_reference_cost() {
        let db = db_with_product().await;

        // No receipts: cost_cents 7000 applies. (10000 - 7000) × 3 = 9000
        let sale = db
            .sales()
            .record("carton", None, SaleKind::Single, 3, 10_000)
            .await
            .unwrap();
        assert_eq!(sale.profit_cents, Some(9_000));
    }

    #[tokio::test]
    async fn test_recalculation_is_idempotent() {
        let db = db_with_product().await;
        let earlier = Utc::now() - chrono::Duration::days(1);
        db.stock().receive("carton", 3, 100, earlier).await.unwrap();

        let first = db
            .sales()
            .record("carton", None, SaleKind::Single, 1, 1_000)
            .await
            .unwrap();
        let second = db
            .sales()
            .record("carton", None, SaleKind::Single, 2, 1_200)
            .await
            .unwrap();

        let summary = db.sales().recalculate_all_profits().await.unwrap();
        assert_eq!(summary.updated, 2);
        assert_eq!(summary.failed, 0);

        let after_first = db.sales().get_by_id(&first.id).await.unwrap().unwrap();
        let after_second = db.sales().get_by_id(&second.id).await.unwrap().unwrap();
        assert_eq!(after_first.profit_cents, first.profit_cents);
        assert_eq!(after_second.profit_cents, second.profit_cents);

        // Running it again changes nothing either
        let summary = db.sales().recalculate_all_profits().await.unwrap();
        assert_eq!(summary.updated, 2);
    }

    #[tokio::test]
    async fn test_recalculation_repairs_missing_profit() {
        let db = db_with_product().await;
        let sale = db
            .sales()
            .record("carton", None, SaleKind::Single, 2, 10_000)
            .await
            .unwrap();

        sqlx::query("UPDATE sales SET profit_cents = NULL WHERE id = ?1")
            .bind(&sale.id)
            .execute(db.pool())
            .await
            .unwrap();

        db.sales().recalculate_all_profits().await.unwrap();
        let repaired = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(repaired.profit_cents, Some(6_000));
    }
}
