use std::fmt::Debug;

use chrono::{DateTime, Utc};

use super::errors::LoyaltyError;
use crate::{
    db_types::{CustomerId, LedgerEntry, MerchantId, PhoneHash, ShadowBalance, Wallet},
    traits::{ConversionStats, ExpirationMetrics, LoyaltyDatabase},
};

/// Read-only access to balances, the ledger and program statistics.
pub struct StatsApi<B> {
    db: B,
}

impl<B> Debug for StatsApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StatsApi")
    }
}

impl<B> StatsApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> StatsApi<B>
where B: LoyaltyDatabase
{
    pub async fn conversion_stats(&self, merchant_id: &MerchantId) -> Result<ConversionStats, LoyaltyError> {
        self.conversion_stats_at(merchant_id, Utc::now()).await
    }

    /// Statistics as of `now`. `now` only affects which shadow balances count as currently active.
    pub async fn conversion_stats_at(
        &self,
        merchant_id: &MerchantId,
        now: DateTime<Utc>,
    ) -> Result<ConversionStats, LoyaltyError> {
        Ok(self.db.conversion_stats(merchant_id, now).await?)
    }

    pub async fn expiration_metrics(&self) -> Result<ExpirationMetrics, LoyaltyError> {
        Ok(self.db.expiration_metrics().await?)
    }

    pub async fn ledger_for_merchant(&self, merchant_id: &MerchantId) -> Result<Vec<LedgerEntry>, LoyaltyError> {
        Ok(self.db.fetch_ledger_entries_for_merchant(merchant_id).await?)
    }

    pub async fn wallet(
        &self,
        merchant_id: &MerchantId,
        customer_id: &CustomerId,
    ) -> Result<Option<Wallet>, LoyaltyError> {
        Ok(self.db.fetch_wallet(merchant_id, customer_id).await?)
    }

    pub async fn shadow_balance(&self, id: i64) -> Result<Option<ShadowBalance>, LoyaltyError> {
        Ok(self.db.fetch_shadow_balance(id).await?)
    }

    pub async fn active_shadow_balances(&self, phone_hash: &PhoneHash) -> Result<Vec<ShadowBalance>, LoyaltyError> {
        Ok(self.db.fetch_active_shadow_balances_for_phone(phone_hash).await?)
    }
}
