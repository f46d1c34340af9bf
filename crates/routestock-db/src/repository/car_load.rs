//! # Car-Load Repository
//!
//! Car-load lifecycle and the per-vehicle FIFO stock ledger.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                   Car-Load State Machine                            │
//! │                                                                     │
//! │   create            activate             unload                     │
//! │  ───────► LOADING ──────────► ACTIVE ──────────► UNLOADED           │
//! │              │                   │                   │              │
//! │              │ items editable    │ sales consume     │ items frozen │
//! │              │ load deletable    │ returns refill    │ terminal     │
//! │              ▼                   ▼                   ▼              │
//! │                                             create_from_previous    │
//! │                                             rolls leftovers into    │
//! │                                             a new LOADING load      │
//! │                                                                     │
//! │  Ledger order: decrease consumes oldest `loaded_at` first,          │
//! │  increase refills newest first, capped at `quantity_loaded`.        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbResult;
use routestock_core::fifo::{self, FifoSlice, RefillSlice};
use routestock_core::validation::{validate_name, validate_quantity};
use routestock_core::{CarLoad, CarLoadItem, CarLoadStatus, CoreError};

/// Repository for car-load lifecycle and vehicle ledger operations.
#[derive(Debug, Clone)]
pub struct CarLoadRepository {
    pool: SqlitePool,
}

const SELECT_CAR_LOAD: &str = r#"
    SELECT id, name, status, team, load_date, return_date,
           previous_car_load_id, created_at, updated_at
    FROM car_loads
"#;

const SELECT_ITEM: &str = r#"
    SELECT id, car_load_id, product_id, quantity_loaded, quantity_left,
           loaded_at, from_previous
    FROM car_load_items
"#;

impl CarLoadRepository {
    /// Creates a new CarLoadRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CarLoadRepository { pool }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Creates a new car-load in LOADING state.
    pub async fn create(&self, name: &str, team: Option<&str>) -> DbResult<CarLoad> {
        validate_name(name).map_err(CoreError::from)?;

        let now = Utc::now();
        let car_load = CarLoad {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            status: CarLoadStatus::Loading,
            team: team.map(str::to_string),
            load_date: None,
            return_date: None,
            previous_car_load_id: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO car_loads (
                id, name, status, team, load_date, return_date,
                previous_car_load_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&car_load.id)
        .bind(&car_load.name)
        .bind(car_load.status)
        .bind(&car_load.team)
        .bind(car_load.load_date)
        .bind(car_load.return_date)
        .bind(&car_load.previous_car_load_id)
        .bind(car_load.created_at)
        .bind(car_load.updated_at)
        .execute(&self.pool)
        .await?;

        info!(id = %car_load.id, name = %name, "Created car-load");
        Ok(car_load)
    }

    /// Gets a car-load by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CarLoad>> {
        let car_load = sqlx::query_as::<_, CarLoad>(&format!("{SELECT_CAR_LOAD} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(car_load)
    }

    /// Gets a car-load by ID or fails with a typed NotFound.
    pub async fn get_required(&self, id: &str) -> DbResult<CarLoad> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::not_found("CarLoad", id).into())
    }

    /// Lists all car-loads, newest first.
    pub async fn list(&self) -> DbResult<Vec<CarLoad>> {
        let car_loads =
            sqlx::query_as::<_, CarLoad>(&format!("{SELECT_CAR_LOAD} ORDER BY created_at DESC, id"))
                .fetch_all(&self.pool)
                .await?;

        Ok(car_loads)
    }

    /// Activates a car-load: LOADING → ACTIVE, stamps `load_date`.
    ///
    /// Requires at least one loaded item; an empty load in the field is
    /// meaningless.
    pub async fn activate(&self, id: &str) -> DbResult<()> {
        let car_load = self.get_required(id).await?;

        let item_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM car_load_items WHERE car_load_id = ?1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        if item_count == 0 && car_load.status == CarLoadStatus::Loading {
            return Err(
                CoreError::invalid_state(id, car_load.status, "cannot activate an empty car-load")
                    .into(),
            );
        }

        let now = Utc::now();
        // The status guard is the transition check: a stale or racing
        // activate matches zero rows and must not report success
        let result = sqlx::query(
            r#"
            UPDATE car_loads SET status = ?2, load_date = ?3, updated_at = ?3
            WHERE id = ?1 AND status = ?4
            "#,
        )
        .bind(id)
        .bind(CarLoadStatus::Active)
        .bind(now)
        .bind(CarLoadStatus::Loading)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_required(id).await?;
            return Err(CoreError::invalid_state(
                id,
                current.status,
                "only a LOADING car-load can be activated",
            )
            .into());
        }

        info!(id = %id, "Car-load activated");
        Ok(())
    }

    /// Unloads a car-load: ACTIVE → UNLOADED, stamps `return_date`.
    ///
    /// Terminal. Items freeze; remaining `quantity_left` becomes the
    /// carry-over balance for `create_from_previous`.
    pub async fn unload(&self, id: &str) -> DbResult<()> {
        self.get_required(id).await?;

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE car_loads SET status = ?2, return_date = ?3, updated_at = ?3
            WHERE id = ?1 AND status = ?4
            "#,
        )
        .bind(id)
        .bind(CarLoadStatus::Unloaded)
        .bind(now)
        .bind(CarLoadStatus::Active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_required(id).await?;
            return Err(CoreError::invalid_state(
                id,
                current.status,
                "only an ACTIVE car-load can be unloaded",
            )
            .into());
        }

        info!(id = %id, "Car-load unloaded");
        Ok(())
    }

    /// Deletes a car-load. Only legal while still LOADING; items cascade.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let car_load = self.get_required(id).await?;
        if car_load.status != CarLoadStatus::Loading {
            return Err(CoreError::invalid_state(
                id,
                car_load.status,
                "only a LOADING car-load can be deleted",
            )
            .into());
        }

        sqlx::query("DELETE FROM car_loads WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!(id = %id, "Car-load deleted");
        Ok(())
    }

    /// Creates a new LOADING car-load seeded with the unsold balance of an
    /// UNLOADED one.
    ///
    /// Each surviving item (`quantity_left > 0`) becomes a fresh item whose
    /// `quantity_loaded` is the previous `quantity_left`, marked
    /// `from_previous`. Exhausted items are skipped. The new load links back
    /// via `previous_car_load_id`.
    pub async fn create_from_previous(
        &self,
        previous_id: &str,
        name: &str,
        team: Option<&str>,
    ) -> DbResult<CarLoad> {
        validate_name(name).map_err(CoreError::from)?;

        let previous = self.get_required(previous_id).await?;
        if previous.status != CarLoadStatus::Unloaded {
            return Err(CoreError::invalid_state(
                previous_id,
                previous.status,
                "carry-over requires an UNLOADED source car-load",
            )
            .into());
        }

        let leftovers = sqlx::query_as::<_, CarLoadItem>(&format!(
            "{SELECT_ITEM} WHERE car_load_id = ?1 AND quantity_left > 0 ORDER BY loaded_at, id"
        ))
        .bind(previous_id)
        .fetch_all(&self.pool)
        .await?;

        let now = Utc::now();
        let car_load = CarLoad {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            status: CarLoadStatus::Loading,
            team: team.map(str::to_string),
            load_date: None,
            return_date: None,
            previous_car_load_id: Some(previous_id.to_string()),
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO car_loads (
                id, name, status, team, load_date, return_date,
                previous_car_load_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&car_load.id)
        .bind(&car_load.name)
        .bind(car_load.status)
        .bind(&car_load.team)
        .bind(car_load.load_date)
        .bind(car_load.return_date)
        .bind(&car_load.previous_car_load_id)
        .bind(car_load.created_at)
        .bind(car_load.updated_at)
        .execute(&mut *tx)
        .await?;

        for leftover in &leftovers {
            sqlx::query(
                r#"
                INSERT INTO car_load_items (
                    id, car_load_id, product_id, quantity_loaded, quantity_left,
                    loaded_at, from_previous
                ) VALUES (?1, ?2, ?3, ?4, ?4, ?5, 1)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&car_load.id)
            .bind(&leftover.product_id)
            .bind(leftover.quantity_left)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            id = %car_load.id,
            previous = %previous_id,
            carried_items = leftovers.len(),
            "Created car-load from previous"
        );
        Ok(car_load)
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Loads a product onto a car-load as a new ledger item.
    ///
    /// `quantity_left` starts equal to `quantity_loaded`; `loaded_at` fixes
    /// the item's position in the FIFO order. Forbidden once UNLOADED.
    pub async fn add_item(
        &self,
        car_load_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<CarLoadItem> {
        validate_quantity(quantity).map_err(CoreError::from)?;

        let car_load = self.get_required(car_load_id).await?;
        if !car_load.status.items_mutable() {
            return Err(CoreError::invalid_state(
                car_load_id,
                car_load.status,
                "items of an UNLOADED car-load are frozen",
            )
            .into());
        }

        let exists: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE id = ?1 AND is_active = 1")
                .bind(product_id)
                .fetch_one(&self.pool)
                .await?;
        if exists == 0 {
            return Err(CoreError::not_found("Product", product_id).into());
        }

        let item = CarLoadItem {
            id: Uuid::new_v4().to_string(),
            car_load_id: car_load_id.to_string(),
            product_id: product_id.to_string(),
            quantity_loaded: quantity,
            quantity_left: quantity,
            loaded_at: Utc::now(),
            from_previous: false,
        };

        sqlx::query(
            r#"
            INSERT INTO car_load_items (
                id, car_load_id, product_id, quantity_loaded, quantity_left,
                loaded_at, from_previous
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&item.id)
        .bind(&item.car_load_id)
        .bind(&item.product_id)
        .bind(item.quantity_loaded)
        .bind(item.quantity_left)
        .bind(item.loaded_at)
        .bind(item.from_previous)
        .execute(&self.pool)
        .await?;

        debug!(
            car_load_id = %car_load_id,
            product_id = %product_id,
            quantity = %quantity,
            "Loaded item"
        );
        Ok(item)
    }

    /// Adjusts an item's loaded quantity.
    ///
    /// The new `quantity_loaded` can never drop below what was already
    /// consumed; `quantity_left` is rebased to preserve consumption.
    pub async fn update_item(&self, item_id: &str, quantity_loaded: i64) -> DbResult<()> {
        validate_quantity(quantity_loaded).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;

        let item = self.item_for_update(&mut tx, item_id).await?;
        let car_load = self.load_in_tx(&mut tx, &item.car_load_id).await?;
        if !car_load.status.items_mutable() {
            return Err(CoreError::invalid_state(
                &item.car_load_id,
                car_load.status,
                "items of an UNLOADED car-load are frozen",
            )
            .into());
        }

        let consumed = item.quantity_loaded - item.quantity_left;
        if quantity_loaded < consumed {
            return Err(CoreError::invalid_state(
                &item.car_load_id,
                car_load.status,
                format!("{consumed} units already consumed, cannot shrink below that"),
            )
            .into());
        }

        sqlx::query(
            "UPDATE car_load_items SET quantity_loaded = ?2, quantity_left = ?3 WHERE id = ?1",
        )
        .bind(item_id)
        .bind(quantity_loaded)
        .bind(quantity_loaded - consumed)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Removes an item. Only legal while the item is untouched
    /// (`quantity_left == quantity_loaded`).
    pub async fn delete_item(&self, item_id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let item = self.item_for_update(&mut tx, item_id).await?;
        let car_load = self.load_in_tx(&mut tx, &item.car_load_id).await?;
        if !car_load.status.items_mutable() {
            return Err(CoreError::invalid_state(
                &item.car_load_id,
                car_load.status,
                "items of an UNLOADED car-load are frozen",
            )
            .into());
        }
        if item.quantity_left != item.quantity_loaded {
            return Err(CoreError::invalid_state(
                &item.car_load_id,
                car_load.status,
                "item has consumption history, cannot be deleted",
            )
            .into());
        }

        sqlx::query("DELETE FROM car_load_items WHERE id = ?1")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// All items of a car-load, FIFO order.
    pub async fn items(&self, car_load_id: &str) -> DbResult<Vec<CarLoadItem>> {
        let items = sqlx::query_as::<_, CarLoadItem>(&format!(
            "{SELECT_ITEM} WHERE car_load_id = ?1 ORDER BY loaded_at, id"
        ))
        .bind(car_load_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Available vehicle stock for a product: Σ `quantity_left`.
    pub async fn available(&self, car_load_id: &str, product_id: &str) -> DbResult<i64> {
        let total: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(quantity_left) FROM car_load_items
            WHERE car_load_id = ?1 AND product_id = ?2
            "#,
        )
        .bind(car_load_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(0))
    }

    // =========================================================================
    // FIFO Ledger Mutations
    // =========================================================================

    /// Consumes vehicle stock FIFO (oldest `loaded_at` first).
    ///
    /// All-or-nothing: when the car-load's summed balance cannot cover the
    /// request, `InsufficientStock` is returned and no item is touched.
    pub async fn decrease(
        &self,
        car_load_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<()> {
        validate_quantity(quantity).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;

        let car_load = self.load_in_tx(&mut tx, car_load_id).await?;
        if car_load.status != CarLoadStatus::Active {
            return Err(CoreError::invalid_state(
                car_load_id,
                car_load.status,
                "sales can only consume an ACTIVE car-load",
            )
            .into());
        }

        let slices: Vec<FifoSlice> = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT id, quantity_left FROM car_load_items
            WHERE car_load_id = ?1 AND product_id = ?2
            ORDER BY loaded_at, id
            "#,
        )
        .bind(car_load_id)
        .bind(product_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|(id, quantity_left)| FifoSlice { id, quantity_left })
        .collect();

        let takes = fifo::plan_decrease(product_id, &slices, quantity)?;

        for take in takes {
            sqlx::query(
                "UPDATE car_load_items SET quantity_left = quantity_left - ?2 WHERE id = ?1",
            )
            .bind(&take.id)
            .bind(take.amount)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(
            car_load_id = %car_load_id,
            product_id = %product_id,
            quantity = %quantity,
            "Decreased vehicle stock"
        );
        Ok(())
    }

    /// Refills vehicle stock on a return or cancellation, newest item first.
    ///
    /// Each item's `quantity_left` is capped at its `quantity_loaded`;
    /// anything beyond the newest item's headroom spills into older ones.
    /// Returning more than was ever consumed fails with `InvalidState` and
    /// applies nothing.
    pub async fn increase(
        &self,
        car_load_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<()> {
        validate_quantity(quantity).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;

        let car_load = self.load_in_tx(&mut tx, car_load_id).await?;
        if car_load.status != CarLoadStatus::Active {
            return Err(CoreError::invalid_state(
                car_load_id,
                car_load.status,
                "returns can only refill an ACTIVE car-load",
            )
            .into());
        }

        let slices: Vec<RefillSlice> = sqlx::query_as::<_, (String, i64, i64)>(
            r#"
            SELECT id, quantity_left, quantity_loaded FROM car_load_items
            WHERE car_load_id = ?1 AND product_id = ?2
            ORDER BY loaded_at DESC, id DESC
            "#,
        )
        .bind(car_load_id)
        .bind(product_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|(id, quantity_left, quantity_loaded)| RefillSlice {
            id,
            quantity_left,
            quantity_loaded,
        })
        .collect();

        let (takes, excess) = fifo::plan_increase(&slices, quantity);
        if excess > 0 {
            return Err(CoreError::invalid_state(
                car_load_id,
                car_load.status,
                format!("return of {quantity} exceeds consumed quantity by {excess}"),
            )
            .into());
        }

        for take in takes {
            sqlx::query(
                "UPDATE car_load_items SET quantity_left = quantity_left + ?2 WHERE id = ?1",
            )
            .bind(&take.id)
            .bind(take.amount)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(
            car_load_id = %car_load_id,
            product_id = %product_id,
            quantity = %quantity,
            "Increased vehicle stock"
        );
        Ok(())
    }

    // =========================================================================
    // Transaction helpers
    // =========================================================================

    async fn load_in_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        id: &str,
    ) -> DbResult<CarLoad> {
        sqlx::query_as::<_, CarLoad>(&format!("{SELECT_CAR_LOAD} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| CoreError::not_found("CarLoad", id).into())
    }

    async fn item_for_update(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        item_id: &str,
    ) -> DbResult<CarLoadItem> {
        sqlx::query_as::<_, CarLoadItem>(&format!("{SELECT_ITEM} WHERE id = ?1"))
            .bind(item_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| CoreError::not_found("CarLoadItem", item_id).into())
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

    /// An ACTIVE load with two ledger items for "carton": an older item of
    /// 10 and a newer item of 8.
    async fn active_load_10_8(db: &Database) -> (String, String, String) {
        let load = db.car_loads().create("Tour 12", Some("Team A")).await.unwrap();
        let older = db.car_loads().add_item(&load.id, "carton", 10).await.unwrap();
        // Force distinct loaded_at ordering
        sqlx::query("UPDATE car_load_items SET loaded_at = ?2 WHERE id = ?1")
            .bind(&older.id)
            .bind(Utc::now() - chrono::Duration::hours(1))
            .execute(db.pool())
            .await
            .unwrap();
        let newer = db.car_loads().add_item(&load.id, "carton", 8).await.unwrap();
        db.car_loads().activate(&load.id).await.unwrap();
        (load.id, older.id, newer.id)
    }

    #[tokio::test]
    async fn test_activate_requires_items() {
        let db = db_with_product().await;
        let load = db.car_loads().create("Empty", None).await.unwrap();

        let err = db.car_loads().activate(&load.id).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvalidState { .. })));

        db.car_loads().add_item(&load.id, "carton", 5).await.unwrap();
        db.car_loads().activate(&load.id).await.unwrap();

        let fetched = db.car_loads().get_required(&load.id).await.unwrap();
        assert_eq!(fetched.status, CarLoadStatus::Active);
        assert!(fetched.load_date.is_some());
    }

    #[tokio::test]
    async fn test_activate_twice_is_invalid_state() {
        let db = db_with_product().await;
        let (load_id, _, _) = active_load_10_8(&db).await;
        let first = db.car_loads().get_required(&load_id).await.unwrap();

        // Already ACTIVE: the guarded UPDATE matches nothing and the lost
        // transition surfaces as an error, never a silent Ok
        let err = db.car_loads().activate(&load_id).await.unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InvalidState { status: CarLoadStatus::Active, .. })
        ));

        let after = db.car_loads().get_required(&load_id).await.unwrap();
        assert_eq!(after.load_date, first.load_date);
    }

    #[tokio::test]
    async fn test_unload_requires_active() {
        let db = db_with_product().await;
        let load = db.car_loads().create("Draft", None).await.unwrap();

        let err = db.car_loads().unload(&load.id).await.unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InvalidState { status: CarLoadStatus::Loading, .. })
        ));

        let fetched = db.car_loads().get_required(&load.id).await.unwrap();
        assert_eq!(fetched.status, CarLoadStatus::Loading);
        assert!(fetched.return_date.is_none());
    }

    #[tokio::test]
    async fn test_unload_freezes_items() {
        let db = db_with_product().await;
        let (load_id, _, _) = active_load_10_8(&db).await;

        db.car_loads().unload(&load_id).await.unwrap();
        let fetched = db.car_loads().get_required(&load_id).await.unwrap();
        assert_eq!(fetched.status, CarLoadStatus::Unloaded);
        assert!(fetched.return_date.is_some());

        let err = db
            .car_loads()
            .add_item(&load_id, "carton", 1)
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_delete_only_while_loading() {
        let db = db_with_product().await;
        let (active_id, _, _) = active_load_10_8(&db).await;
        let err = db.car_loads().delete(&active_id).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvalidState { .. })));

        let loading = db.car_loads().create("Draft", None).await.unwrap();
        db.car_loads().add_item(&loading.id, "carton", 3).await.unwrap();
        db.car_loads().delete(&loading.id).await.unwrap();
        assert!(db.car_loads().get_by_id(&loading.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_decrease_consumes_oldest_first() {
        let db = db_with_product().await;
        let (load_id, older_id, newer_id) = active_load_10_8(&db).await;

        db.car_loads().decrease(&load_id, "carton", 12).await.unwrap();

        let items = db.car_loads().items(&load_id).await.unwrap();
        let older = items.iter().find(|i| i.id == older_id).unwrap();
        let newer = items.iter().find(|i| i.id == newer_id).unwrap();
        assert_eq!(older.quantity_left, 0);
        assert_eq!(newer.quantity_left, 6);
        assert_eq!(db.car_loads().available(&load_id, "carton").await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_decrease_insufficient_touches_nothing() {
        let db = db_with_product().await;
        let (load_id, _, _) = active_load_10_8(&db).await;

        let err = db
            .car_loads()
            .decrease(&load_id, "carton", 19)
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InsufficientStock { available: 18, requested: 19, .. })
        ));
        assert_eq!(db.car_loads().available(&load_id, "carton").await.unwrap(), 18);
    }

    #[tokio::test]
    async fn test_increase_refills_newest_first() {
        let db = db_with_product().await;
        let (load_id, older_id, newer_id) = active_load_10_8(&db).await;

        // Consume 12: older 10→0, newer 8→6. Return 3: newest absorbs all.
        db.car_loads().decrease(&load_id, "carton", 12).await.unwrap();
        db.car_loads().increase(&load_id, "carton", 3).await.unwrap();

        let items = db.car_loads().items(&load_id).await.unwrap();
        let older = items.iter().find(|i| i.id == older_id).unwrap();
        let newer = items.iter().find(|i| i.id == newer_id).unwrap();
        assert_eq!(newer.quantity_left, 8); // 6 + 2 capped at loaded 8...
        assert_eq!(older.quantity_left, 1); // ...and the spill lands here
    }

    #[tokio::test]
    async fn test_increase_beyond_loaded_fails_whole() {
        let db = db_with_product().await;
        let (load_id, _, _) = active_load_10_8(&db).await;

        db.car_loads().decrease(&load_id, "carton", 4).await.unwrap();

        let err = db
            .car_loads()
            .increase(&load_id, "carton", 5)
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvalidState { .. })));
        // Nothing applied
        assert_eq!(db.car_loads().available(&load_id, "carton").await.unwrap(), 14);
    }

    #[tokio::test]
    async fn test_create_from_previous_carries_unsold_balance() {
        let db = db_with_product().await;
        let (load_id, _, _) = active_load_10_8(&db).await;

        // Drain the older item fully, leave 6 on the newer
        db.car_loads().decrease(&load_id, "carton", 12).await.unwrap();
        db.car_loads().unload(&load_id).await.unwrap();

        let next = db
            .car_loads()
            .create_from_previous(&load_id, "Tour 13", Some("Team A"))
            .await
            .unwrap();
        assert_eq!(next.previous_car_load_id.as_deref(), Some(load_id.as_str()));
        assert_eq!(next.status, CarLoadStatus::Loading);

        // Exhausted item skipped; survivor's quantity_left became the new
        // quantity_loaded
        let items = db.car_loads().items(&next.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity_loaded, 6);
        assert_eq!(items[0].quantity_left, 6);
        assert!(items[0].from_previous);
    }

    #[tokio::test]
    async fn test_carry_over_requires_unloaded_source() {
        let db = db_with_product().await;
        let (load_id, _, _) = active_load_10_8(&db).await;

        let err = db
            .car_loads()
            .create_from_previous(&load_id, "Tour 13", None)
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_update_item_cannot_shrink_below_consumed() {
        let db = db_with_product().await;
        let (load_id, older_id, _) = active_load_10_8(&db).await;

        db.car_loads().decrease(&load_id, "carton", 7).await.unwrap();

        let err = db.car_loads().update_item(&older_id, 5).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvalidState { .. })));

        // Growing is fine and rebases quantity_left
        db.car_loads().update_item(&older_id, 12).await.unwrap();
        let items = db.car_loads().items(&load_id).await.unwrap();
        let older = items.iter().find(|i| i.id == older_id).unwrap();
        assert_eq!(older.quantity_loaded, 12);
        assert_eq!(older.quantity_left, 5);
    }

    #[tokio::test]
    async fn test_delete_item_requires_untouched() {
        let db = db_with_product().await;
        let (load_id, older_id, newer_id) = active_load_10_8(&db).await;

        db.car_loads().decrease(&load_id, "carton", 2).await.unwrap();

        let err = db.car_loads().delete_item(&older_id).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvalidState { .. })));

        db.car_loads().delete_item(&newer_id).await.unwrap();
        let items = db.car_loads().items(&load_id).await.unwrap();
        assert_eq!(items.len(), 1);
    }
}
