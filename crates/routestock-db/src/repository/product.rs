//! # Product Repository
//!
//! Database operations for the product catalog.
//!
//! ## Parent/Variant Storage
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │              How ProductKind Maps To The Table                      │
//! │                                                                     │
//! │  products.parent_id = NULL   →  ProductKind::Base                   │
//! │  products.parent_id = <id>   →  ProductKind::Variant                │
//! │                                                                     │
//! │  The nullable self-reference stays in SQL; the tagged enum is the   │
//! │  only shape the rest of the system sees. Insertion enforces what    │
//! │  the schema cannot: a parent must itself be a base product, and     │
//! │  base_quantity must be positive (a zero would break every later     │
//! │  unit conversion).                                                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use routestock_core::validation::{validate_base_quantity, validate_name, validate_price_cents};
use routestock_core::{CoreError, Product, ProductKind};

/// Raw row shape of the `products` table.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    price_cents: i64,
    cost_cents: i64,
    parent_id: Option<String>,
    base_quantity: i64,
    is_active: bool,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        let kind = match row.parent_id {
            None => ProductKind::Base {
                base_quantity: row.base_quantity,
            },
            Some(parent_id) => ProductKind::Variant {
                parent_id,
                base_quantity: row.base_quantity,
            },
        };
        Product {
            id: row.id,
            name: row.name,
            price_cents: row.price_cents,
            cost_cents: row.cost_cents,
            kind,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_PRODUCT: &str = r#"
    SELECT id, name, price_cents, cost_cents, parent_id, base_quantity,
           is_active, created_at, updated_at
    FROM products
"#;

/// Repository for product catalog operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product.
    ///
    /// ## Validation (creation time, not conversion time)
    /// - name non-empty, price/cost non-negative
    /// - `base_quantity` strictly positive
    /// - a variant's parent must exist, be active, and be a base product
    ///   (variants never themselves have variants)
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        validate_name(&product.name).map_err(CoreError::from)?;
        validate_price_cents(product.price_cents).map_err(CoreError::from)?;
        validate_price_cents(product.cost_cents).map_err(CoreError::from)?;
        validate_base_quantity(product.base_quantity()).map_err(CoreError::from)?;

        if let Some(parent_id) = product.parent_id() {
            let parent = self
                .get_by_id(parent_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Product", parent_id))?;
            if parent.is_variant() {
                return Err(CoreError::invalid_configuration(
                    &product.id,
                    "parent must be a base product, not a variant",
                )
                .into());
            }
            if !parent.is_active {
                return Err(CoreError::invalid_configuration(
                    &product.id,
                    "parent product is inactive",
                )
                .into());
            }
        }

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, price_cents, cost_cents, parent_id, base_quantity,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.parent_id())
        .bind(product.base_quantity())
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product.clone())
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Product::from))
    }

    /// Gets a product by ID or fails with a typed NotFound.
    pub async fn get_required(&self, id: &str) -> DbResult<Product> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Product", id).into())
    }

    /// Lists the variants of a base product, creation order.
    ///
    /// Oldest-first matters: the first variant's price is the fractional
    /// variance pricing heuristic at reconciliation time.
    pub async fn variants_of(&self, parent_id: &str) -> DbResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "{SELECT_PRODUCT} WHERE parent_id = ?1 ORDER BY created_at, id"
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// The oldest-created variant of a base product, if any.
    pub async fn first_variant_of(&self, parent_id: &str) -> DbResult<Option<Product>> {
        Ok(self.variants_of(parent_id).await?.into_iter().next())
    }

    /// Updates an existing product's mutable fields.
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");

        validate_name(&product.name).map_err(CoreError::from)?;
        validate_price_cents(product.price_cents).map_err(CoreError::from)?;
        validate_base_quantity(product.base_quantity()).map_err(CoreError::from)?;

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                price_cents = ?3,
                cost_cents = ?4,
                base_quantity = ?5,
                is_active = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.base_quantity())
        .bind(product.is_active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// Historical sales and ledger entries keep referencing it.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating product");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET is_active = 0, updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn base(id: &str, base_quantity: i64) -> Product {
        let now = Utc::now();
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            price_cents: 10_000,
            cost_cents: 7_000,
            kind: ProductKind::Base { base_quantity },
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn variant(id: &str, parent_id: &str, base_quantity: i64) -> Product {
        let mut p = base(id, base_quantity);
        p.kind = ProductKind::Variant {
            parent_id: parent_id.to_string(),
            base_quantity,
        };
        p
    }

    #[tokio::test]
    async fn test_insert_and_fetch_roundtrip() {
        let db = test_db().await;
        db.products().insert(&base("carton", 1000)).await.unwrap();

        let fetched = db.products().get_by_id("carton").await.unwrap().unwrap();
        assert_eq!(fetched.name, "Product carton");
        assert_eq!(fetched.base_quantity(), 1000);
        assert!(!fetched.is_variant());
    }

    #[tokio::test]
    async fn test_variant_requires_existing_parent() {
        let db = test_db().await;
        let err = db
            .products()
            .insert(&variant("pack", "missing", 20))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_variant_of_variant_rejected() {
        let db = test_db().await;
        db.products().insert(&base("carton", 1000)).await.unwrap();
        db.products()
            .insert(&variant("pack", "carton", 20))
            .await
            .unwrap();

        let err = db
            .products()
            .insert(&variant("stick", "pack", 5))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InvalidConfiguration { .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_base_quantity_rejected_at_creation() {
        let db = test_db().await;
        let err = db.products().insert(&base("broken", 0)).await.unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_first_variant_is_oldest_created() {
        let db = test_db().await;
        db.products().insert(&base("carton", 1000)).await.unwrap();

        let mut older = variant("pack-a", "carton", 20);
        older.created_at = Utc::now() - chrono::Duration::hours(2);
        db.products().insert(&older).await.unwrap();

        let newer = variant("pack-b", "carton", 10);
        db.products().insert(&newer).await.unwrap();

        let first = db
            .products()
            .first_variant_of("carton")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.id, "pack-a");
    }

    #[tokio::test]
    async fn test_deactivate_is_soft() {
        let db = test_db().await;
        db.products().insert(&base("carton", 1000)).await.unwrap();
        db.products().deactivate("carton").await.unwrap();

        let fetched = db.products().get_by_id("carton").await.unwrap().unwrap();
        assert!(!fetched.is_active);
        assert_eq!(db.products().count().await.unwrap(), 0);
    }
}
