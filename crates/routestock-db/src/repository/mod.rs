//! # Repository Layer
//!
//! Database access organized by aggregate.
//!
//! ## Pattern
//! Each repository owns a clone of the pool and exposes typed async
//! operations. Multi-row ledger mutations follow plan-then-apply: read the
//! ordered rows inside a transaction, plan the mutation with the pure
//! functions from routestock-core, apply the plan as UPDATEs, commit.
//! Business rule failures surface as `DbError::Domain`.

pub mod car_load;
pub mod inventory;
pub mod product;
pub mod sale;
pub mod stock;

pub use car_load::CarLoadRepository;
pub use inventory::InventoryRepository;
pub use product::ProductRepository;
pub use sale::SaleRepository;
pub use stock::StockLedgerRepository;
