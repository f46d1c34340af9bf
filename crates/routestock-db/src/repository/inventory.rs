//! # Inventory Repository
//!
//! Inventory-close reconciliation for car-loads.
//!
//! ## What Gets Compared
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │              Reconciliation, per parent product                     │
//! │                                                                     │
//! │   total_loaded    ◄── recomputed live from car_load_items           │
//! │   total_sold      ◄── recomputed live from sales (parent sales +    │
//! │                       child sales converted to parent units)        │
//! │   total_returned  ◄── counted by the inventory author               │
//! │                                                                     │
//! │   result = sold + returned - loaded       (parent units, decimal)   │
//! │                                                                     │
//! │   Inventory items store loaded/sold snapshots for display, but the  │
//! │   report recomputes both so a late sale can never be hidden by a    │
//! │   stale snapshot. Reconciliation never mutates either ledger.       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::product::ProductRepository;
use routestock_core::convert;
use routestock_core::reconcile::{self, VarianceLine, VariantPricing};
use routestock_core::validation::validate_name;
use routestock_core::{CarLoadInventory, CarLoadInventoryItem, CoreError, Product};

// =============================================================================
// Input / Output Types
// =============================================================================

/// One counted-return line entered by the inventory author, in the
/// product's own unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountedReturn {
    pub product_id: String,
    pub total_returned: i64,
    pub comment: Option<String>,
}

/// The reconciliation report for one inventory, grouped by parent product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub inventory: CarLoadInventory,
    pub lines: Vec<VarianceLine>,
    /// Σ line value, in cents. Negative when the load came up short.
    pub total_value_cents: i64,
}

/// Per-parent running aggregate while building the report.
#[derive(Debug, Default)]
struct Aggregate {
    loaded: f64,
    sold: f64,
    returned: f64,
}

/// Repository for inventory snapshots and reconciliation reports.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Opens a new inventory for a car-load.
    ///
    /// At most one unclosed inventory may exist per car-load; a second open
    /// fails until the first is closed.
    pub async fn open(
        &self,
        car_load_id: &str,
        name: &str,
        author: Option<&str>,
    ) -> DbResult<CarLoadInventory> {
        validate_name(name).map_err(CoreError::from)?;

        let car_load = crate::repository::car_load::CarLoadRepository::new(self.pool.clone())
            .get_required(car_load_id)
            .await?;

        let open_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM car_load_inventories WHERE car_load_id = ?1 AND closed = 0",
        )
        .bind(car_load_id)
        .fetch_one(&self.pool)
        .await?;
        if open_count > 0 {
            return Err(CoreError::invalid_state(
                car_load_id,
                car_load.status,
                "an open inventory already exists for this car-load",
            )
            .into());
        }

        let inventory = CarLoadInventory {
            id: Uuid::new_v4().to_string(),
            car_load_id: car_load_id.to_string(),
            name: name.to_string(),
            closed: false,
            author: author.map(str::to_string),
            comment: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO car_load_inventories (
                id, car_load_id, name, closed, author, comment, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&inventory.id)
        .bind(&inventory.car_load_id)
        .bind(&inventory.name)
        .bind(inventory.closed)
        .bind(&inventory.author)
        .bind(&inventory.comment)
        .bind(inventory.created_at)
        .execute(&self.pool)
        .await?;

        info!(id = %inventory.id, car_load_id = %car_load_id, "Opened inventory");
        Ok(inventory)
    }

    /// Gets an inventory by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CarLoadInventory>> {
        let inventory = sqlx::query_as::<_, CarLoadInventory>(
            r#"
            SELECT id, car_load_id, name, closed, author, comment, created_at
            FROM car_load_inventories WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inventory)
    }

    /// Gets an inventory by ID or fails with a typed NotFound.
    pub async fn get_required(&self, id: &str) -> DbResult<CarLoadInventory> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::not_found("CarLoadInventory", id).into())
    }

    /// All inventories of a car-load, newest first.
    pub async fn for_car_load(&self, car_load_id: &str) -> DbResult<Vec<CarLoadInventory>> {
        let inventories = sqlx::query_as::<_, CarLoadInventory>(
            r#"
            SELECT id, car_load_id, name, closed, author, comment, created_at
            FROM car_load_inventories
            WHERE car_load_id = ?1
            ORDER BY created_at DESC, id
            "#,
        )
        .bind(car_load_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(inventories)
    }

    /// Records counted returns on an open inventory.
    ///
    /// Each count upserts one line per product (a recount replaces the
    /// previous one). `total_loaded`, `total_loaded_from_previous` and
    /// `total_sold` are snapshotted from the ledgers at this moment, in the
    /// product's own unit; the report later recomputes them live.
    pub async fn add_items(&self, inventory_id: &str, counts: &[CountedReturn]) -> DbResult<()> {
        let inventory = self.get_required(inventory_id).await?;
        self.ensure_open(&inventory).await?;

        // Validate every count before any write. An unknown product is a
        // typed NotFound; these reads must stay outside the transaction
        // (a single-connection pool deadlocks on a read inside it).
        let products = ProductRepository::new(self.pool.clone());
        for count in counts {
            if count.total_returned < 0 {
                return Err(CoreError::Validation(
                    routestock_core::ValidationError::MustNotBeNegative {
                        field: "total_returned".to_string(),
                    },
                )
                .into());
            }
            products.get_required(&count.product_id).await?;
        }

        let mut tx = self.pool.begin().await?;

        for count in counts {
            let (loaded, from_previous): (Option<i64>, Option<i64>) = sqlx::query_as(
                r#"
                SELECT SUM(quantity_loaded),
                       SUM(CASE WHEN from_previous THEN quantity_loaded ELSE 0 END)
                FROM car_load_items
                WHERE car_load_id = ?1 AND product_id = ?2
                "#,
            )
            .bind(&inventory.car_load_id)
            .bind(&count.product_id)
            .fetch_one(&mut *tx)
            .await?;

            let sold: Option<i64> = sqlx::query_scalar(
                "SELECT SUM(quantity) FROM sales WHERE car_load_id = ?1 AND product_id = ?2",
            )
            .bind(&inventory.car_load_id)
            .bind(&count.product_id)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO car_load_inventory_items (
                    id, inventory_id, product_id, total_loaded, total_sold,
                    total_returned, total_loaded_from_previous, comment
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(inventory_id, product_id) DO UPDATE SET
                    total_loaded = excluded.total_loaded,
                    total_sold = excluded.total_sold,
                    total_returned = excluded.total_returned,
                    total_loaded_from_previous = excluded.total_loaded_from_previous,
                    comment = excluded.comment
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(inventory_id)
            .bind(&count.product_id)
            .bind(loaded.unwrap_or(0) as f64)
            .bind(sold.unwrap_or(0) as f64)
            .bind(count.total_returned)
            .bind(from_previous.unwrap_or(0) as f64)
            .bind(&count.comment)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(inventory_id = %inventory_id, count = counts.len(), "Recorded counted returns");
        Ok(())
    }

    /// Closes an inventory, freezing its lines. Physical stock is untouched.
    pub async fn close(&self, inventory_id: &str) -> DbResult<()> {
        let inventory = self.get_required(inventory_id).await?;
        self.ensure_open(&inventory).await?;

        sqlx::query("UPDATE car_load_inventories SET closed = 1 WHERE id = ?1")
            .bind(inventory_id)
            .execute(&self.pool)
            .await?;

        info!(id = %inventory_id, "Inventory closed");
        Ok(())
    }

    /// All lines of an inventory.
    pub async fn items(&self, inventory_id: &str) -> DbResult<Vec<CarLoadInventoryItem>> {
        let items = sqlx::query_as::<_, CarLoadInventoryItem>(
            r#"
            SELECT id, inventory_id, product_id, total_loaded, total_sold,
                   total_returned, total_loaded_from_previous, comment
            FROM car_load_inventory_items
            WHERE inventory_id = ?1
            ORDER BY product_id
            "#,
        )
        .bind(inventory_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    // =========================================================================
    // Reconciliation Report
    // =========================================================================

    /// Builds the variance report for an inventory.
    ///
    /// Loaded and sold quantities are recomputed live from the ledgers —
    /// the stored snapshots are display data only. Counted returns come
    /// from the inventory lines. Variant quantities are converted to
    /// fractional parent units before aggregation, so each report line is
    /// one parent product.
    pub async fn report(&self, inventory_id: &str) -> DbResult<ReconciliationReport> {
        let inventory = self.get_required(inventory_id).await?;
        let products = ProductRepository::new(self.pool.clone());

        let mut cache: HashMap<String, Product> = HashMap::new();
        let mut aggregates: BTreeMap<String, Aggregate> = BTreeMap::new();

        // Loaded, live from the vehicle ledger
        let loaded_rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT product_id, SUM(quantity_loaded) FROM car_load_items
            WHERE car_load_id = ?1
            GROUP BY product_id
            "#,
        )
        .bind(&inventory.car_load_id)
        .fetch_all(&self.pool)
        .await?;

        for (product_id, quantity) in loaded_rows {
            let (parent_id, parent_equivalent) = self
                .to_parent(&products, &mut cache, &product_id, quantity as f64)
                .await?;
            aggregates.entry(parent_id).or_default().loaded += parent_equivalent;
        }

        // Sold, live from the sales table
        let sold_rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT product_id, SUM(quantity) FROM sales
            WHERE car_load_id = ?1
            GROUP BY product_id
            "#,
        )
        .bind(&inventory.car_load_id)
        .fetch_all(&self.pool)
        .await?;

        for (product_id, quantity) in sold_rows {
            let (parent_id, parent_equivalent) = self
                .to_parent(&products, &mut cache, &product_id, quantity as f64)
                .await?;
            aggregates.entry(parent_id).or_default().sold += parent_equivalent;
        }

        // Returned, from the counted inventory lines
        for item in self.items(inventory_id).await? {
            let (parent_id, parent_equivalent) = self
                .to_parent(&products, &mut cache, &item.product_id, item.total_returned as f64)
                .await?;
            aggregates.entry(parent_id).or_default().returned += parent_equivalent;
        }

        let mut lines = Vec::with_capacity(aggregates.len());
        let mut total_value_cents = 0;
        for (parent_id, aggregate) in aggregates {
            let parent = self.resolve(&products, &mut cache, &parent_id).await?;

            let first_variant = match products.first_variant_of(&parent_id).await? {
                Some(variant) => Some(VariantPricing {
                    price_cents: variant.price_cents,
                    ratio: convert::capacity_ratio(&parent, &variant)?,
                }),
                None => None,
            };

            let line = reconcile::variance_line(
                parent.id.clone(),
                parent.name.clone(),
                aggregate.loaded,
                aggregate.sold,
                aggregate.returned,
                parent.price(),
                first_variant,
            );
            total_value_cents += line.value_cents;
            lines.push(line);
        }

        lines.sort_by(|a, b| a.product_name.cmp(&b.product_name));

        Ok(ReconciliationReport {
            inventory,
            lines,
            total_value_cents,
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn ensure_open(&self, inventory: &CarLoadInventory) -> DbResult<()> {
        if !inventory.closed {
            return Ok(());
        }
        let car_load = crate::repository::car_load::CarLoadRepository::new(self.pool.clone())
            .get_required(&inventory.car_load_id)
            .await?;
        Err(CoreError::invalid_state(
            &inventory.car_load_id,
            car_load.status,
            format!("inventory {} is closed", inventory.id),
        )
        .into())
    }

    async fn resolve(
        &self,
        products: &ProductRepository,
        cache: &mut HashMap<String, Product>,
        id: &str,
    ) -> DbResult<Product> {
        if let Some(product) = cache.get(id) {
            return Ok(product.clone());
        }
        let product = products.get_required(id).await?;
        cache.insert(id.to_string(), product.clone());
        Ok(product)
    }

    /// Resolves a product's parent group and converts a quantity in its own
    /// unit to fractional parent units.
    async fn to_parent(
        &self,
        products: &ProductRepository,
        cache: &mut HashMap<String, Product>,
        product_id: &str,
        quantity: f64,
    ) -> DbResult<(String, f64)> {
        let product = self.resolve(products, cache, product_id).await?;
        match product.parent_id() {
            None => Ok((product.id.clone(), quantity)),
            Some(parent_id) => {
                let parent_id = parent_id.to_string();
                let parent = self.resolve(products, cache, &parent_id).await?;
                let parent_equivalent = convert::to_parent_equivalent(&parent, &product, quantity)?;
                Ok((parent_id, parent_equivalent))
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use routestock_core::reconcile::VarianceKind;
    use routestock_core::{ProductKind, SaleKind};

    /// Carton (base, 1000, 100.00) with a pack variant (20, 2.50): 50 packs
    /// per carton.
    async fn catalog_db() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        let carton = Product {
            id: "carton".to_string(),
            name: "Carton".to_string(),
            price_cents: 10_000,
            cost_cents: 7_000,
            kind: ProductKind::Base { base_quantity: 1000 },
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let pack = Product {
            id: "pack".to_string(),
            name: "Pack".to_string(),
            price_cents: 250,
            cost_cents: 150,
            kind: ProductKind::Variant {
                parent_id: "carton".to_string(),
                base_quantity: 20,
            },
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&carton).await.unwrap();
        db.products().insert(&pack).await.unwrap();
        db
    }

    async fn active_load(db: &Database, cartons: i64) -> String {
        let load = db.car_loads().create("Tour 12", None).await.unwrap();
        db.car_loads().add_item(&load.id, "carton", cartons).await.unwrap();
        db.car_loads().activate(&load.id).await.unwrap();
        load.id
    }

    #[tokio::test]
    async fn test_balanced_report() {
        let db = catalog_db().await;
        let load_id = active_load(&db, 10).await;

        db.sales()
            .record("carton", Some(&load_id), SaleKind::InvoiceItem, 6, 10_000)
            .await
            .unwrap();

        let inventory = db.inventories().open(&load_id, "Close-out", None).await.unwrap();
        db.inventories()
            .add_items(
                &inventory.id,
                &[CountedReturn {
                    product_id: "carton".to_string(),
                    total_returned: 4,
                    comment: None,
                }],
            )
            .await
            .unwrap();

        let report = db.inventories().report(&inventory.id).await.unwrap();
        assert_eq!(report.lines.len(), 1);
        let line = &report.lines[0];
        assert_eq!(line.total_loaded, 10.0);
        assert_eq!(line.total_sold, 6.0);
        assert_eq!(line.total_returned, 4.0);
        assert_eq!(line.kind, VarianceKind::Balanced);
        assert_eq!(report.total_value_cents, 0);
    }

    #[tokio::test]
    async fn test_fractional_shortage_priced_with_first_variant() {
        let db = catalog_db().await;
        let load_id = active_load(&db, 10).await;

        // 6 cartons sold off the ledger, 25 packs (0.5 carton) sold at the
        // counter but attributed to the load
        db.sales()
            .record("carton", Some(&load_id), SaleKind::InvoiceItem, 6, 10_000)
            .await
            .unwrap();
        db.sales()
            .record("pack", Some(&load_id), SaleKind::Single, 25, 250)
            .await
            .unwrap();

        let inventory = db.inventories().open(&load_id, "Close-out", None).await.unwrap();
        db.inventories()
            .add_items(
                &inventory.id,
                &[CountedReturn {
                    product_id: "carton".to_string(),
                    total_returned: 3,
                    comment: None,
                }],
            )
            .await
            .unwrap();

        let report = db.inventories().report(&inventory.id).await.unwrap();
        let line = &report.lines[0];
        // 6 + 0.5 + 3 - 10 = -0.5 cartons short
        assert_eq!(line.result, -0.5);
        assert_eq!(line.kind, VarianceKind::Shortage);
        // -0.5 carton priced as 25 packs at 2.50
        assert_eq!(line.value_cents, -6_250);
        assert_eq!(report.total_value_cents, -6_250);
    }

    #[tokio::test]
    async fn test_variant_returns_convert_to_parent_units() {
        let db = catalog_db().await;
        let load_id = active_load(&db, 4).await;

        db.sales()
            .record("carton", Some(&load_id), SaleKind::InvoiceItem, 3, 10_000)
            .await
            .unwrap();

        let inventory = db.inventories().open(&load_id, "Close-out", None).await.unwrap();
        db.inventories()
            .add_items(
                &inventory.id,
                &[
                    CountedReturn {
                        product_id: "carton".to_string(),
                        total_returned: 0,
                        comment: None,
                    },
                    CountedReturn {
                        product_id: "pack".to_string(),
                        total_returned: 50,
                        comment: Some("loose packs in the cab".to_string()),
                    },
                ],
            )
            .await
            .unwrap();

        let report = db.inventories().report(&inventory.id).await.unwrap();
        let line = &report.lines[0];
        // 50 packs came back: exactly one carton equivalent
        assert_eq!(line.total_returned, 1.0);
        assert_eq!(line.result, 0.0);
        assert_eq!(line.kind, VarianceKind::Balanced);
    }

    #[tokio::test]
    async fn test_single_open_inventory_per_car_load() {
        let db = catalog_db().await;
        let load_id = active_load(&db, 2).await;

        let first = db.inventories().open(&load_id, "First", None).await.unwrap();
        let err = db
            .inventories()
            .open(&load_id, "Second", None)
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvalidState { .. })));

        db.inventories().close(&first.id).await.unwrap();
        db.inventories().open(&load_id, "Second", None).await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_inventory_is_frozen() {
        let db = catalog_db().await;
        let load_id = active_load(&db, 2).await;

        let inventory = db.inventories().open(&load_id, "Close-out", None).await.unwrap();
        db.inventories().close(&inventory.id).await.unwrap();

        let err = db
            .inventories()
            .add_items(
                &inventory.id,
                &[CountedReturn {
                    product_id: "carton".to_string(),
                    total_returned: 2,
                    comment: None,
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvalidState { .. })));

        let err = db.inventories().close(&inventory.id).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_counting_unknown_product_is_not_found() {
        let db = catalog_db().await;
        let load_id = active_load(&db, 2).await;

        let inventory = db.inventories().open(&load_id, "Close-out", None).await.unwrap();
        let err = db
            .inventories()
            .add_items(
                &inventory.id,
                &[CountedReturn {
                    product_id: "ghost".to_string(),
                    total_returned: 1,
                    comment: None,
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::NotFound { .. })));
        assert!(db.inventories().items(&inventory.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_inventory_uniqueness_is_schema_enforced() {
        let db = catalog_db().await;
        let load_id = active_load(&db, 2).await;
        db.inventories().open(&load_id, "First", None).await.unwrap();

        // Even a write that bypasses the repository cannot create a second
        // open inventory for the same car-load
        let err = sqlx::query(
            r#"
            INSERT INTO car_load_inventories (
                id, car_load_id, name, closed, author, comment, created_at
            ) VALUES (?1, ?2, 'Second', 0, NULL, NULL, ?3)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&load_id)
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap_err();

        let err = crate::error::DbError::from(err);
        assert!(matches!(err, crate::error::DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_recount_replaces_previous_line() {
        let db = catalog_db().await;
        let load_id = active_load(&db, 5).await;

        let inventory = db.inventories().open(&load_id, "Close-out", None).await.unwrap();
        let count = |returned| {
            vec![CountedReturn {
                product_id: "carton".to_string(),
                total_returned: returned,
                comment: None,
            }]
        };
        db.inventories().add_items(&inventory.id, &count(2)).await.unwrap();
        db.inventories().add_items(&inventory.id, &count(5)).await.unwrap();

        let items = db.inventories().items(&inventory.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].total_returned, 5);
        assert_eq!(items[0].total_loaded, 5.0);
    }
}
