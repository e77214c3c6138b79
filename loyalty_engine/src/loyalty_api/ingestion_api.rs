use std::{fmt::Debug, sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};
use log::*;

use super::{
    errors::LoyaltyError,
    expiration_api::forfeit_shadow_balance,
    ingest_objects::{IngestRequest, IngestResponse},
    with_deadline,
};
use crate::{
    db_types::{Campaign, CustomerId, MerchantId, NewLedgerEntry, PhoneHash},
    helpers::hash_phone,
    strategies::{RewardStrategy, StrategyError, StrategyInput, StrategyRegistry, StrategyResult},
    traits::{AtomicUnit, IdentityResolver, LoyaltyDatabase, LoyaltyStoreError},
};

/// `IngestionApi` processes purchase events.
///
/// For every purchase it finds the merchant's running campaign, asks the identity resolver whether the customer is
/// registered, and then credits either the customer's wallet or a shadow balance keyed by their phone hash. The
/// balance update and its ledger entry are written in one atomic unit.
pub struct IngestionApi<B, I> {
    db: B,
    identity: I,
    strategies: Arc<StrategyRegistry>,
    shadow_ttl: Duration,
}

impl<B, I> Debug for IngestionApi<B, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IngestionApi (shadow ttl: {})", self.shadow_ttl)
    }
}

impl<B, I> IngestionApi<B, I> {
    pub fn new(db: B, identity: I, strategies: Arc<StrategyRegistry>, shadow_ttl: Duration) -> Self {
        Self { db, identity, strategies, shadow_ttl }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, I> IngestionApi<B, I>
where
    B: LoyaltyDatabase,
    I: IdentityResolver,
{
    pub async fn process_transaction(
        &self,
        merchant_id: &MerchantId,
        request: IngestRequest,
    ) -> Result<IngestResponse, LoyaltyError> {
        self.process_transaction_at(merchant_id, request, Utc::now()).await
    }

    /// As [`Self::process_transaction`], but fails with [`LoyaltyError::Timeout`] if the identity provider or the
    /// store do not respond within `deadline`. Nothing is committed in that case.
    pub async fn process_transaction_with_deadline(
        &self,
        merchant_id: &MerchantId,
        request: IngestRequest,
        deadline: StdDuration,
    ) -> Result<IngestResponse, LoyaltyError> {
        with_deadline(deadline, self.process_transaction(merchant_id, request)).await
    }

    /// Processes one purchase as if it happened at `now`.
    pub async fn process_transaction_at(
        &self,
        merchant_id: &MerchantId,
        request: IngestRequest,
        now: DateTime<Utc>,
    ) -> Result<IngestResponse, LoyaltyError> {
        if !request.amount.is_positive() {
            return Err(LoyaltyError::InvalidAmount(request.amount));
        }
        let campaign = self
            .db
            .fetch_active_campaign(merchant_id, now)
            .await?
            .ok_or_else(|| LoyaltyError::NoActiveCampaign(merchant_id.clone()))?;
        if !campaign.is_running_at(now) {
            warn!("📥️ The store returned campaign #{} for merchant {merchant_id}, but it is not running", campaign.id);
            return Err(LoyaltyError::NoActiveCampaign(merchant_id.clone()));
        }
        let strategy = self.strategies.get(campaign.campaign_type).ok_or_else(|| {
            error!(
                "📥️ Campaign #{} is of type {}, but no strategy is registered for it. This is a configuration bug.",
                campaign.id, campaign.campaign_type
            );
            LoyaltyError::UnknownStrategy(campaign.campaign_type)
        })?;
        strategy
            .validate(&campaign.config)
            .map_err(|source| LoyaltyError::InvalidCampaignConfig { campaign_id: campaign.id, source })?;
        let phone_hash = hash_phone(&request.phone);
        let customer_id = self.identity.user_exists_by_phone(&request.phone).await.map_err(|e| {
            warn!("📥️ Identity lookup for transaction {} failed. {e}", request.transaction_id);
            e
        })?;
        match customer_id {
            Some(customer_id) => {
                self.process_for_wallet(&campaign, strategy, &customer_id, &phone_hash, &request, now).await
            },
            None => self.process_for_shadow(&campaign, strategy, &phone_hash, &request, now).await,
        }
    }

    async fn process_for_wallet(
        &self,
        campaign: &Campaign,
        strategy: &RewardStrategy,
        customer_id: &CustomerId,
        phone_hash: &PhoneHash,
        request: &IngestRequest,
        now: DateTime<Utc>,
    ) -> Result<IngestResponse, LoyaltyError> {
        let merchant_id = &campaign.merchant_id;
        let mut unit = self.db.begin_atomic_unit().await?;
        let wallet = unit.fetch_or_create_wallet(merchant_id, customer_id, phone_hash, now).await?;
        let result = run_strategy(strategy, campaign, request, &wallet.state)?;
        let new_balance = wallet.balance + result.balance_delta;
        let wallet = unit.update_wallet(wallet.id, new_balance, &result.new_state, now).await?;
        let entry = NewLedgerEntry::earn_for_wallet(
            merchant_id.clone(),
            campaign.id,
            wallet.id,
            result.balance_delta,
            request.metadata.clone(),
            now,
        );
        let entry = unit.append_ledger_entry(entry).await?;
        unit.commit().await?;
        debug!(
            "📥️ Transaction {} credited {} to wallet #{} (ledger #{}). New balance: {}",
            request.transaction_id, result.balance_delta, wallet.id, entry.id, wallet.balance
        );
        Ok(IngestResponse::for_wallet(wallet.balance, result.reward))
    }

    async fn process_for_shadow(
        &self,
        campaign: &Campaign,
        strategy: &RewardStrategy,
        phone_hash: &PhoneHash,
        request: &IngestRequest,
        now: DateTime<Utc>,
    ) -> Result<IngestResponse, LoyaltyError> {
        let merchant_id = &campaign.merchant_id;
        let mut unit = self.db.begin_atomic_unit().await?;
        let shadow = unit.fetch_or_create_shadow_balance(merchant_id, phone_hash, self.shadow_ttl, now).await?;
        if shadow.is_expired_at(now) {
            unit.rollback().await?;
            info!(
                "📥️ Transaction {} rejected. Shadow balance #{} expired at {}.",
                request.transaction_id, shadow.id, shadow.expires_at
            );
            // Forfeit it now so that a retry starts a fresh shadow balance instead of waiting for the sweep
            match forfeit_shadow_balance(&self.db, shadow.id, now).await {
                Ok(marked) => info!("📥️ Shadow balance #{} expired. {} forfeited", marked.id, marked.amount),
                Err(LoyaltyStoreError::ShadowBalanceNotActive(_)) => {
                    debug!("📥️ Shadow balance #{} was already expired by the sweep", shadow.id)
                },
                Err(e) => warn!("📥️ Could not expire shadow balance #{}. The sweep will retry. {e}", shadow.id),
            }
            return Err(LoyaltyError::ShadowExpired { shadow_id: shadow.id, expires_at: shadow.expires_at });
        }
        let result = run_strategy(strategy, campaign, request, &shadow.state)?;
        let new_amount = shadow.amount + result.balance_delta;
        let shadow = unit.update_shadow_balance(shadow.id, new_amount, &result.new_state, now).await?;
        let entry = NewLedgerEntry::earn_for_shadow(
            merchant_id.clone(),
            campaign.id,
            shadow.id,
            result.balance_delta,
            request.metadata.clone(),
            now,
        );
        let entry = unit.append_ledger_entry(entry).await?;
        unit.commit().await?;
        debug!(
            "📥️ Transaction {} credited {} to shadow balance #{} (ledger #{}). New amount: {}",
            request.transaction_id, result.balance_delta, shadow.id, entry.id, shadow.amount
        );
        Ok(IngestResponse::for_shadow(shadow.amount, shadow.expires_at, result.reward))
    }
}

fn run_strategy(
    strategy: &RewardStrategy,
    campaign: &Campaign,
    request: &IngestRequest,
    current_state: &serde_json::Value,
) -> Result<StrategyResult, LoyaltyError> {
    let input = StrategyInput {
        campaign,
        transaction_id: &request.transaction_id,
        amount: request.amount,
        current_state,
        metadata: &request.metadata,
    };
    strategy.execute(&input).map_err(|source| match source {
        StrategyError::InvalidConfig(..) => LoyaltyError::InvalidCampaignConfig { campaign_id: campaign.id, source },
        StrategyError::Execution(..) => LoyaltyError::StrategyFailed { campaign_id: campaign.id, source },
    })
}
