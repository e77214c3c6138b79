#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use loyalty_common::Amount;
use loyalty_engine::{
    db_types::{
        Campaign,
        CampaignType,
        CustomerId,
        LedgerEntry,
        MerchantId,
        NewCampaign,
        NewLedgerEntry,
        PhoneHash,
        ShadowBalance,
        Wallet,
    },
    test_utils::prepare_env,
    AtomicUnit,
    ConversionApi,
    ConversionStats,
    ExpirationApi,
    ExpirationMetrics,
    IdentityResolver,
    IdentityResolverError,
    IngestionApi,
    LoyaltyDatabase,
    LoyaltyStoreError,
    SqliteAtomicUnit,
    SqliteDatabase,
    StatsApi,
    StrategyRegistry,
};
use mockall::mock;
use serde_json::{json, Value};

mock! {
    pub Identity {}
    impl IdentityResolver for Identity {
        async fn user_exists_by_phone(&self, phone: &str) -> Result<Option<CustomerId>, IdentityResolverError>;
    }
}

impl MockIdentity {
    /// Nobody is registered.
    pub fn nobody() -> Self {
        let mut identity = MockIdentity::new();
        identity.expect_user_exists_by_phone().returning(|_| Ok(None));
        identity
    }

    /// Every phone belongs to `customer_id`.
    pub fn everyone_is(customer_id: &str) -> Self {
        let customer_id = CustomerId::from(customer_id);
        let mut identity = MockIdentity::new();
        identity.expect_user_exists_by_phone().returning(move |_| Ok(Some(customer_id.clone())));
        identity
    }

    pub fn unavailable() -> Self {
        let mut identity = MockIdentity::new();
        identity
            .expect_user_exists_by_phone()
            .returning(|_| Err(IdentityResolverError::Unavailable("connection refused".into())));
        identity
    }
}

pub const PHONE: &str = "+15550001111";

pub async fn prepare_test_env() -> SqliteDatabase {
    prepare_env::prepare_test_env(&prepare_env::random_db_path()).await
}

pub fn punch_card_config() -> Value {
    json!({"required_punches": 3, "reward_amount": 10, "reward_type": "points"})
}

pub fn cashback_config() -> Value {
    json!({"percentage": 5, "max_cashback": 20})
}

pub async fn seed_campaign(db: &SqliteDatabase, merchant: &str, campaign_type: CampaignType, config: Value) -> Campaign {
    let campaign = NewCampaign::new(MerchantId::from(merchant), "test campaign", campaign_type, config);
    db.insert_campaign(campaign).await.expect("Error inserting campaign")
}

pub fn ingestion_api<I: IdentityResolver>(
    db: &SqliteDatabase,
    identity: I,
    ttl: Duration,
) -> IngestionApi<SqliteDatabase, I> {
    IngestionApi::new(db.clone(), identity, Arc::new(StrategyRegistry::standard()), ttl)
}

pub fn conversion_api(db: &SqliteDatabase) -> ConversionApi<SqliteDatabase> {
    ConversionApi::new(db.clone())
}

pub fn expiration_api(db: &SqliteDatabase) -> ExpirationApi<SqliteDatabase> {
    ExpirationApi::new(db.clone())
}

pub fn stats_api(db: &SqliteDatabase) -> StatsApi<SqliteDatabase> {
    StatsApi::new(db.clone())
}

/// Rewrites a shadow balance's expiry, bypassing the engine.
pub async fn set_expiry(db: &SqliteDatabase, shadow_id: i64, expires_at: DateTime<Utc>) {
    sqlx::query("UPDATE shadow_balances SET expires_at = $1 WHERE id = $2")
        .bind(expires_at)
        .bind(shadow_id)
        .execute(db.pool())
        .await
        .expect("Error updating expiry");
}

pub async fn count_rows(db: &SqliteDatabase, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(db.pool())
        .await
        .expect("Error counting rows")
}

/// The SQLite backend, except that one shadow balance always loses the race to reach a terminal state:
/// `mark_shadow_converted` fails for it as if another unit had converted or expired it first.
///
/// With [`ContendedDatabase::ending_campaign`], campaign lookups also return a campaign that stops running before
/// the caller gets to use it.
#[derive(Clone)]
pub struct ContendedDatabase {
    inner: SqliteDatabase,
    contended_shadow: i64,
    ending_campaign: Option<Campaign>,
}

impl ContendedDatabase {
    pub fn new(db: &SqliteDatabase, contended_shadow: i64) -> Self {
        Self { inner: db.clone(), contended_shadow, ending_campaign: None }
    }

    pub fn ending_campaign(mut self, campaign: Campaign) -> Self {
        self.ending_campaign = Some(campaign);
        self
    }
}

pub struct ContendedUnit {
    inner: SqliteAtomicUnit,
    contended_shadow: i64,
}

impl LoyaltyDatabase for ContendedDatabase {
    type Unit = ContendedUnit;

    fn url(&self) -> &str {
        self.inner.url()
    }

    async fn begin_atomic_unit(&self) -> Result<Self::Unit, LoyaltyStoreError> {
        let inner = self.inner.begin_atomic_unit().await?;
        Ok(ContendedUnit { inner, contended_shadow: self.contended_shadow })
    }

    async fn fetch_active_campaign(
        &self,
        merchant_id: &MerchantId,
        now: DateTime<Utc>,
    ) -> Result<Option<Campaign>, LoyaltyStoreError> {
        match &self.ending_campaign {
            Some(campaign) => Ok(Some(campaign.clone())),
            None => self.inner.fetch_active_campaign(merchant_id, now).await,
        }
    }

    async fn fetch_active_shadow_balances_for_phone(
        &self,
        phone_hash: &PhoneHash,
    ) -> Result<Vec<ShadowBalance>, LoyaltyStoreError> {
        self.inner.fetch_active_shadow_balances_for_phone(phone_hash).await
    }

    async fn fetch_expired_shadow_balances(&self, now: DateTime<Utc>) -> Result<Vec<ShadowBalance>, LoyaltyStoreError> {
        self.inner.fetch_expired_shadow_balances(now).await
    }

    async fn fetch_ledger_entries_for_merchant(
        &self,
        merchant_id: &MerchantId,
    ) -> Result<Vec<LedgerEntry>, LoyaltyStoreError> {
        self.inner.fetch_ledger_entries_for_merchant(merchant_id).await
    }

    async fn fetch_wallet(
        &self,
        merchant_id: &MerchantId,
        customer_id: &CustomerId,
    ) -> Result<Option<Wallet>, LoyaltyStoreError> {
        self.inner.fetch_wallet(merchant_id, customer_id).await
    }

    async fn fetch_shadow_balance(&self, id: i64) -> Result<Option<ShadowBalance>, LoyaltyStoreError> {
        self.inner.fetch_shadow_balance(id).await
    }

    async fn conversion_stats(
        &self,
        merchant_id: &MerchantId,
        now: DateTime<Utc>,
    ) -> Result<ConversionStats, LoyaltyStoreError> {
        self.inner.conversion_stats(merchant_id, now).await
    }

    async fn expiration_metrics(&self) -> Result<ExpirationMetrics, LoyaltyStoreError> {
        self.inner.expiration_metrics().await
    }
}

impl AtomicUnit for ContendedUnit {
    async fn fetch_or_create_wallet(
        &mut self,
        merchant_id: &MerchantId,
        customer_id: &CustomerId,
        phone_hash: &PhoneHash,
        now: DateTime<Utc>,
    ) -> Result<Wallet, LoyaltyStoreError> {
        self.inner.fetch_or_create_wallet(merchant_id, customer_id, phone_hash, now).await
    }

    async fn update_wallet(
        &mut self,
        wallet_id: i64,
        balance: Amount,
        state: &Value,
        now: DateTime<Utc>,
    ) -> Result<Wallet, LoyaltyStoreError> {
        self.inner.update_wallet(wallet_id, balance, state, now).await
    }

    async fn fetch_or_create_shadow_balance(
        &mut self,
        merchant_id: &MerchantId,
        phone_hash: &PhoneHash,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<ShadowBalance, LoyaltyStoreError> {
        self.inner.fetch_or_create_shadow_balance(merchant_id, phone_hash, ttl, now).await
    }

    async fn update_shadow_balance(
        &mut self,
        shadow_id: i64,
        amount: Amount,
        state: &Value,
        now: DateTime<Utc>,
    ) -> Result<ShadowBalance, LoyaltyStoreError> {
        self.inner.update_shadow_balance(shadow_id, amount, state, now).await
    }

    async fn fetch_active_shadow_balances_for_phone(
        &mut self,
        phone_hash: &PhoneHash,
    ) -> Result<Vec<ShadowBalance>, LoyaltyStoreError> {
        self.inner.fetch_active_shadow_balances_for_phone(phone_hash).await
    }

    async fn mark_shadow_converted(
        &mut self,
        shadow_id: i64,
        at: DateTime<Utc>,
    ) -> Result<ShadowBalance, LoyaltyStoreError> {
        if shadow_id == self.contended_shadow {
            return Err(LoyaltyStoreError::ShadowBalanceNotActive(shadow_id));
        }
        self.inner.mark_shadow_converted(shadow_id, at).await
    }

    async fn append_ledger_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, LoyaltyStoreError> {
        self.inner.append_ledger_entry(entry).await
    }

    async fn commit(self) -> Result<(), LoyaltyStoreError> {
        self.inner.commit().await
    }

    async fn rollback(self) -> Result<(), LoyaltyStoreError> {
        self.inner.rollback().await
    }
}
