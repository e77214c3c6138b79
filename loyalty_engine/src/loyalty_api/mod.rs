//! # Loyalty engine public API
//!
//! The `loyalty_api` module exposes the programmatic API for the loyalty engine. Each API wraps a backend that
//! implements [`LoyaltyDatabase`](crate::traits::LoyaltyDatabase), so callers can pick only the pieces they need.
//!
//! * [`ingestion_api`] turns purchase events into balance changes, on a real wallet for registered customers and on a
//!   shadow balance for everyone else.
//! * [`conversion_api`] migrates a customer's shadow balances into real wallets when they register.
//! * [`expiration_api`] sweeps shadow balances that outlived their TTL and books the breakage.
//! * [`stats_api`] provides read-only access to conversion statistics and the ledger.
//!
//! # API usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use loyalty_engine::{IngestionApi, SqliteDatabase, StrategyRegistry, UnregisteredIdentityResolver};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let registry = Arc::new(StrategyRegistry::standard());
//! let api = IngestionApi::new(db, UnregisteredIdentityResolver, registry, chrono::Duration::hours(72));
//! let response = api.process_transaction(&merchant_id, request).await?;
//! ```
pub mod conversion_api;
pub mod errors;
pub mod expiration_api;
pub mod ingest_objects;
pub mod ingestion_api;
pub mod stats_api;

use std::{future::Future, time::Duration};

use errors::LoyaltyError;

/// Runs `fut`, failing with [`LoyaltyError::Timeout`] if it does not complete within `deadline`.
pub(crate) async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, LoyaltyError>
where F: Future<Output = Result<T, LoyaltyError>> {
    tokio::time::timeout(deadline, fut).await.map_err(|_| LoyaltyError::Timeout(deadline))?
}
