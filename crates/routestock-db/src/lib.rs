//! # routestock-db: Database Layer for Routestock
//!
//! This crate provides database access for the Routestock stock and
//! car-load reconciliation engine. It uses SQLite for local storage with
//! sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Routestock Data Flow                              │
//! │                                                                         │
//! │  Caller (back office / CRUD layer)                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  routestock-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ Product, Stock │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ CarLoad, Sale  │    │ 001_init.sql │  │   │
//! │  │   │ WAL mode      │    │ Inventory      │    │ 002_idx.sql  │  │   │
//! │  │   └───────────────┘    └───────┬────────┘    └──────────────┘  │   │
//! │  │                                │                                │   │
//! │  │                 FIFO plans come from routestock-core;           │   │
//! │  │                 this crate reads rows, plans, applies, commits  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │                       SQLite Database (routestock.db)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (product, stock, car-load,
//!   inventory, sale)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use routestock_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/routestock.db")).await?;
//!
//! let load = db.car_loads().create("Tour 12", Some("Team A")).await?;
//! db.car_loads().add_item(&load.id, &product.id, 10).await?;
//! db.car_loads().activate(&load.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::car_load::CarLoadRepository;
pub use repository::inventory::{CountedReturn, InventoryRepository, ReconciliationReport};
pub use repository::product::ProductRepository;
pub use repository::sale::{RecalcSummary, SaleRepository};
pub use repository::stock::StockLedgerRepository;
