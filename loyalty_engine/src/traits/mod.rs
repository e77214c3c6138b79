//! # Storage and collaborator contracts
//!
//! This module defines the interfaces that loyalty engine *backends* and external collaborators must provide.
//!
//! * [`LoyaltyDatabase`] is the balance and ledger store. It hands out read-only queries directly, and opens
//!   [`AtomicUnit`]s for everything that mutates a wallet or shadow balance.
//! * [`AtomicUnit`] is a single transactional scope. A balance update and its ledger entry are always written through
//!   the same unit, and either both survive (`commit`) or neither does (`rollback`, or simply dropping the unit).
//! * [`IdentityResolver`] answers "does a registered customer own this phone number?".
mod data_objects;
mod identity_resolver;
mod loyalty_database;

pub use data_objects::{ConversionResult, ConversionStats, ExpirationMetrics, SweepResult};
pub use identity_resolver::{IdentityResolver, IdentityResolverError, UnregisteredIdentityResolver};
pub use loyalty_database::{AtomicUnit, LoyaltyDatabase, LoyaltyStoreError};
