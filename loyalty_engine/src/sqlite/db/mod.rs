//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers can obtain a connection from a pool, or open a transaction when several statements must succeed
//! or fail together, and call through to the functions without any other changes.
//!
//! Timestamps are always bound from Rust, never generated by SQLite, so that stored instants share one textual
//! format and compare correctly.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod campaigns;
pub mod ledger;
pub mod shadow_balances;
pub mod stats;
pub mod wallets;

const SQLITE_DB_URL: &str = "sqlite://data/loyalty_store.db";

pub fn db_url() -> String {
    let result = env::var("LOYALTY_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ LOYALTY_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
