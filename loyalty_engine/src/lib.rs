//! Loyalty Engine
//!
//! The loyalty engine turns merchant purchase events into loyalty rewards. It is provider-agnostic: the store, the
//! identity provider and the transport that delivers events are all supplied by the caller.
//!
//! The library is divided into these main sections:
//! 1. The data model ([`mod@db_types`]) and the reward [`mod@strategies`]. Strategies are pure functions of a
//!    campaign configuration, a progress state and a purchase amount.
//! 2. Backend contracts ([`mod@traits`]) and the SQLite backend ([`SqliteDatabase`]). You should never need to touch
//!    the database directly. Instead, use the public API.
//! 3. The public API: [`IngestionApi`] for purchases, [`ConversionApi`] for registrations, [`ExpirationApi`] for the
//!    shadow balance sweep, and [`StatsApi`] for reporting.
//!
//! Customers that are not yet registered earn into a *shadow balance* keyed by the SHA-256 hash of their phone
//! number. If they register before the shadow balance expires, it is converted into a real wallet. Otherwise the
//! sweep forfeits it and books the amount as breakage.
pub mod db_types;
pub mod helpers;
mod loyalty_api;
pub mod strategies;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use loyalty_api::{
    conversion_api::ConversionApi,
    errors::LoyaltyError,
    expiration_api::ExpirationApi,
    ingest_objects::{IngestRequest, IngestResponse},
    ingestion_api::IngestionApi,
    stats_api::StatsApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db::db_url, SqliteAtomicUnit, SqliteDatabase};
pub use strategies::{RewardInfo, StrategyRegistry};
pub use traits::{
    AtomicUnit,
    ConversionResult,
    ConversionStats,
    ExpirationMetrics,
    IdentityResolver,
    IdentityResolverError,
    LoyaltyDatabase,
    LoyaltyStoreError,
    SweepResult,
    UnregisteredIdentityResolver,
};
