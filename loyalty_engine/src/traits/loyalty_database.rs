use chrono::{DateTime, Duration, Utc};
use loyalty_common::Amount;
use serde_json::Value;
use thiserror::Error;

use crate::{
    db_types::{Campaign, CustomerId, LedgerEntry, MerchantId, NewLedgerEntry, PhoneHash, ShadowBalance, Wallet},
    traits::data_objects::{ConversionStats, ExpirationMetrics},
};

/// The highest level of behaviour a backend must expose to support the loyalty engine.
///
/// Methods on this trait are single reads. Anything that changes a balance goes through [`AtomicUnit`], which is
/// obtained from [`LoyaltyDatabase::begin_atomic_unit`].
#[allow(async_fn_in_trait)]
pub trait LoyaltyDatabase: Clone {
    type Unit: AtomicUnit;

    /// The URL of the database
    fn url(&self) -> &str;

    /// Opens a new transactional scope.
    async fn begin_atomic_unit(&self) -> Result<Self::Unit, LoyaltyStoreError>;

    /// Fetches the campaign that is running for the merchant at `now`. If more than one qualifies, the most recently
    /// created one is returned.
    async fn fetch_active_campaign(
        &self,
        merchant_id: &MerchantId,
        now: DateTime<Utc>,
    ) -> Result<Option<Campaign>, LoyaltyStoreError>;

    /// All shadow balances for the phone hash, across every merchant, that have not reached a terminal state.
    async fn fetch_active_shadow_balances_for_phone(
        &self,
        phone_hash: &PhoneHash,
    ) -> Result<Vec<ShadowBalance>, LoyaltyStoreError>;

    /// Shadow balances that are still active but whose expiry instant is at or before `now`.
    async fn fetch_expired_shadow_balances(&self, now: DateTime<Utc>) -> Result<Vec<ShadowBalance>, LoyaltyStoreError>;

    /// The merchant's ledger, oldest entry first.
    async fn fetch_ledger_entries_for_merchant(
        &self,
        merchant_id: &MerchantId,
    ) -> Result<Vec<LedgerEntry>, LoyaltyStoreError>;

    async fn fetch_wallet(
        &self,
        merchant_id: &MerchantId,
        customer_id: &CustomerId,
    ) -> Result<Option<Wallet>, LoyaltyStoreError>;

    async fn fetch_shadow_balance(&self, id: i64) -> Result<Option<ShadowBalance>, LoyaltyStoreError>;

    async fn conversion_stats(
        &self,
        merchant_id: &MerchantId,
        now: DateTime<Utc>,
    ) -> Result<ConversionStats, LoyaltyStoreError>;

    async fn expiration_metrics(&self) -> Result<ExpirationMetrics, LoyaltyStoreError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), LoyaltyStoreError> {
        Ok(())
    }
}

/// A transactional scope over the balance and ledger store.
///
/// Nothing written through a unit is visible to others until [`AtomicUnit::commit`] succeeds. Dropping a unit
/// without committing discards every change made through it.
#[allow(async_fn_in_trait)]
pub trait AtomicUnit: Sized {
    /// Returns the wallet for `(merchant_id, customer_id)`, creating an empty one if none exists.
    async fn fetch_or_create_wallet(
        &mut self,
        merchant_id: &MerchantId,
        customer_id: &CustomerId,
        phone_hash: &PhoneHash,
        now: DateTime<Utc>,
    ) -> Result<Wallet, LoyaltyStoreError>;

    async fn update_wallet(
        &mut self,
        wallet_id: i64,
        balance: Amount,
        state: &Value,
        now: DateTime<Utc>,
    ) -> Result<Wallet, LoyaltyStoreError>;

    /// Returns the active shadow balance for `(merchant_id, phone_hash)`. If there is none, a new one is created that
    /// expires at `now + ttl`.
    ///
    /// The returned balance may already be past its expiry; it is up to the caller to decide what to do with it.
    async fn fetch_or_create_shadow_balance(
        &mut self,
        merchant_id: &MerchantId,
        phone_hash: &PhoneHash,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<ShadowBalance, LoyaltyStoreError>;

    /// Sets the amount and state of an active shadow balance.
    ///
    /// Fails with [`LoyaltyStoreError::ShadowBalanceNotActive`] if the balance has been converted or expired in the
    /// meantime.
    async fn update_shadow_balance(
        &mut self,
        shadow_id: i64,
        amount: Amount,
        state: &Value,
        now: DateTime<Utc>,
    ) -> Result<ShadowBalance, LoyaltyStoreError>;

    async fn fetch_active_shadow_balances_for_phone(
        &mut self,
        phone_hash: &PhoneHash,
    ) -> Result<Vec<ShadowBalance>, LoyaltyStoreError>;

    /// Moves a shadow balance into its terminal state. The row that is returned carries the amount as it stood at
    /// the moment it was marked.
    ///
    /// Fails with [`LoyaltyStoreError::ShadowBalanceNotActive`] if the balance is already terminal, so a shadow
    /// balance can only ever be converted or expired once.
    async fn mark_shadow_converted(&mut self, shadow_id: i64, at: DateTime<Utc>)
        -> Result<ShadowBalance, LoyaltyStoreError>;

    async fn append_ledger_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, LoyaltyStoreError>;

    async fn commit(self) -> Result<(), LoyaltyStoreError>;

    async fn rollback(self) -> Result<(), LoyaltyStoreError>;
}

#[derive(Debug, Clone, Error)]
pub enum LoyaltyStoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Shadow balance #{0} has already been converted or expired")]
    ShadowBalanceNotActive(i64),
    #[error("The requested wallet id {0} does not exist")]
    WalletNotFound(i64),
    #[error("Could not insert campaign. {0}")]
    CampaignInsertError(String),
}

impl From<sqlx::Error> for LoyaltyStoreError {
    fn from(e: sqlx::Error) -> Self {
        LoyaltyStoreError::DatabaseError(e.to_string())
    }
}
