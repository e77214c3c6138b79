//! `SqliteDatabase` is a concrete implementation of a loyalty engine backend.
//!
//! It uses SQLite as the store and implements the [`LoyaltyDatabase`] and [`AtomicUnit`] traits. Each
//! [`SqliteAtomicUnit`] wraps a single SQLite transaction.
use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use loyalty_common::Amount;
use serde_json::Value;
use sqlx::{migrate, Sqlite, SqlitePool, Transaction};

use super::db::{campaigns, db_url, ledger, new_pool, shadow_balances, stats, wallets};
use crate::{
    db_types::{
        Campaign,
        CustomerId,
        LedgerEntry,
        MerchantId,
        NewCampaign,
        NewLedgerEntry,
        PhoneHash,
        ShadowBalance,
        Wallet,
    },
    traits::{AtomicUnit, ConversionStats, ExpirationMetrics, LoyaltyDatabase, LoyaltyStoreError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using the URL in `LOYALTY_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn run_migrations(&self) -> Result<(), LoyaltyStoreError> {
        migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LoyaltyStoreError::DatabaseError(format!("Could not run migrations. {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Stores a new campaign. Campaigns are managed outside the engine; this is the entry point for seeding them.
    pub async fn insert_campaign(&self, campaign: NewCampaign) -> Result<Campaign, LoyaltyStoreError> {
        let mut conn = self.pool.acquire().await?;
        let campaign = campaigns::insert_campaign(campaign, Utc::now(), &mut conn).await?;
        debug!("🗃️ Campaign #{} ({}) created for merchant {}", campaign.id, campaign.campaign_type, campaign.merchant_id);
        Ok(campaign)
    }
}

impl LoyaltyDatabase for SqliteDatabase {
    type Unit = SqliteAtomicUnit;

    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn begin_atomic_unit(&self) -> Result<Self::Unit, LoyaltyStoreError> {
        let tx = self.pool.begin().await?;
        Ok(SqliteAtomicUnit { tx })
    }

    async fn fetch_active_campaign(
        &self,
        merchant_id: &MerchantId,
        now: DateTime<Utc>,
    ) -> Result<Option<Campaign>, LoyaltyStoreError> {
        let mut conn = self.pool.acquire().await?;
        campaigns::fetch_active_campaign(merchant_id, now, &mut conn).await
    }

    async fn fetch_active_shadow_balances_for_phone(
        &self,
        phone_hash: &PhoneHash,
    ) -> Result<Vec<ShadowBalance>, LoyaltyStoreError> {
        let mut conn = self.pool.acquire().await?;
        shadow_balances::fetch_active_shadow_balances_for_phone(phone_hash, &mut conn).await
    }

    async fn fetch_expired_shadow_balances(&self, now: DateTime<Utc>) -> Result<Vec<ShadowBalance>, LoyaltyStoreError> {
        let mut conn = self.pool.acquire().await?;
        shadow_balances::fetch_expired_shadow_balances(now, &mut conn).await
    }

    async fn fetch_ledger_entries_for_merchant(
        &self,
        merchant_id: &MerchantId,
    ) -> Result<Vec<LedgerEntry>, LoyaltyStoreError> {
        let mut conn = self.pool.acquire().await?;
        ledger::fetch_entries_for_merchant(merchant_id, &mut conn).await
    }

    async fn fetch_wallet(
        &self,
        merchant_id: &MerchantId,
        customer_id: &CustomerId,
    ) -> Result<Option<Wallet>, LoyaltyStoreError> {
        let mut conn = self.pool.acquire().await?;
        wallets::fetch_wallet(merchant_id, customer_id, &mut conn).await
    }

    async fn fetch_shadow_balance(&self, id: i64) -> Result<Option<ShadowBalance>, LoyaltyStoreError> {
        let mut conn = self.pool.acquire().await?;
        shadow_balances::fetch_shadow_balance(id, &mut conn).await
    }

    async fn conversion_stats(
        &self,
        merchant_id: &MerchantId,
        now: DateTime<Utc>,
    ) -> Result<ConversionStats, LoyaltyStoreError> {
        let mut conn = self.pool.acquire().await?;
        stats::conversion_stats(merchant_id, now, &mut conn).await
    }

    async fn expiration_metrics(&self) -> Result<ExpirationMetrics, LoyaltyStoreError> {
        let mut conn = self.pool.acquire().await?;
        stats::expiration_metrics(&mut conn).await
    }

    async fn close(&mut self) -> Result<(), LoyaltyStoreError> {
        self.pool.close().await;
        info!("🗃️ Database connection pool closed");
        Ok(())
    }
}

/// A single SQLite transaction. Dropping the unit without calling [`AtomicUnit::commit`] rolls it back.
pub struct SqliteAtomicUnit {
    tx: Transaction<'static, Sqlite>,
}

impl Debug for SqliteAtomicUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SqliteAtomicUnit")
    }
}

impl AtomicUnit for SqliteAtomicUnit {
    async fn fetch_or_create_wallet(
        &mut self,
        merchant_id: &MerchantId,
        customer_id: &CustomerId,
        phone_hash: &PhoneHash,
        now: DateTime<Utc>,
    ) -> Result<Wallet, LoyaltyStoreError> {
        wallets::fetch_or_create_wallet(merchant_id, customer_id, phone_hash, now, &mut self.tx).await
    }

    async fn update_wallet(
        &mut self,
        wallet_id: i64,
        balance: Amount,
        state: &Value,
        now: DateTime<Utc>,
    ) -> Result<Wallet, LoyaltyStoreError> {
        wallets::update_wallet(wallet_id, balance, state, now, &mut self.tx).await
    }

    async fn fetch_or_create_shadow_balance(
        &mut self,
        merchant_id: &MerchantId,
        phone_hash: &PhoneHash,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<ShadowBalance, LoyaltyStoreError> {
        shadow_balances::fetch_or_create_shadow_balance(merchant_id, phone_hash, ttl, now, &mut self.tx).await
    }

    async fn update_shadow_balance(
        &mut self,
        shadow_id: i64,
        amount: Amount,
        state: &Value,
        now: DateTime<Utc>,
    ) -> Result<ShadowBalance, LoyaltyStoreError> {
        shadow_balances::update_shadow_balance(shadow_id, amount, state, now, &mut self.tx).await
    }

    async fn fetch_active_shadow_balances_for_phone(
        &mut self,
        phone_hash: &PhoneHash,
    ) -> Result<Vec<ShadowBalance>, LoyaltyStoreError> {
        shadow_balances::fetch_active_shadow_balances_for_phone(phone_hash, &mut self.tx).await
    }

    async fn mark_shadow_converted(
        &mut self,
        shadow_id: i64,
        at: DateTime<Utc>,
    ) -> Result<ShadowBalance, LoyaltyStoreError> {
        shadow_balances::mark_converted(shadow_id, at, &mut self.tx).await
    }

    async fn append_ledger_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, LoyaltyStoreError> {
        ledger::insert_entry(entry, &mut self.tx).await
    }

    async fn commit(self) -> Result<(), LoyaltyStoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), LoyaltyStoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
