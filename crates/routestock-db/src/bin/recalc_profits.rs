//! # Profit Recalculation Batch
//!
//! Recomputes the persisted profit of every sale from the stock ledger's
//! weighted-average cost as of each sale's own timestamp.
//!
//! ## Usage
//! ```bash
//! # Recalculate against the default database
//! cargo run -p routestock-db --bin recalc_profits
//!
//! # Specify database path
//! cargo run -p routestock-db --bin recalc_profits -- --db ./data/routestock.db
//! ```
//!
//! Idempotent: with an unchanged receipt ledger, a second run reproduces
//! the same cents. A sale that cannot be recomputed (e.g. its product row
//! was removed manually) is logged and skipped; the batch continues.

use std::env;

use routestock_db::{Database, DbConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./routestock.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Routestock Profit Recalculation");
                println!();
                println!("Usage: recalc_profits [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./routestock.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Routestock Profit Recalculation");
    println!("===============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");

    let start = std::time::Instant::now();
    let summary = db.sales().recalculate_all_profits().await?;
    let elapsed = start.elapsed();

    println!();
    println!("✓ Recalculated {} sales in {:?}", summary.updated, elapsed);
    if summary.failed > 0 {
        println!("⚠ {} sales could not be recalculated (see logs)", summary.failed);
    }

    db.close().await;
    Ok(())
}
