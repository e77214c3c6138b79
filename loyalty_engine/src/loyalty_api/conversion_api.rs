use std::{fmt::Debug, time::Duration as StdDuration};

use chrono::{DateTime, Utc};
use log::*;

use super::{errors::LoyaltyError, with_deadline};
use crate::{
    db_types::{CustomerId, NewLedgerEntry, PhoneHash},
    helpers::{hash_phone, merge_states},
    traits::{AtomicUnit, ConversionResult, LoyaltyDatabase},
};

/// `ConversionApi` moves a newly registered customer's shadow balances into real wallets.
///
/// Every active shadow balance for the phone hash is converted inside a single atomic unit, so a conversion either
/// happens completely or not at all. Converted balances are no longer active, which makes a repeated call for the
/// same customer a harmless no-op.
pub struct ConversionApi<B> {
    db: B,
}

impl<B> Debug for ConversionApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConversionApi")
    }
}

impl<B> ConversionApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> ConversionApi<B>
where B: LoyaltyDatabase
{
    /// Entry point for "customer registered" events. The raw phone number is hashed exactly as it is during
    /// ingestion.
    pub async fn handle_customer_registered(
        &self,
        customer_id: &CustomerId,
        phone: &str,
    ) -> Result<ConversionResult, LoyaltyError> {
        let phone_hash = hash_phone(phone);
        self.convert_shadow_to_real_wallet(customer_id, &phone_hash).await
    }

    pub async fn convert_shadow_to_real_wallet(
        &self,
        customer_id: &CustomerId,
        phone_hash: &PhoneHash,
    ) -> Result<ConversionResult, LoyaltyError> {
        self.convert_shadow_to_real_wallet_at(customer_id, phone_hash, Utc::now()).await
    }

    pub async fn convert_with_deadline(
        &self,
        customer_id: &CustomerId,
        phone_hash: &PhoneHash,
        deadline: StdDuration,
    ) -> Result<ConversionResult, LoyaltyError> {
        with_deadline(deadline, self.convert_shadow_to_real_wallet(customer_id, phone_hash)).await
    }

    /// Converts every active shadow balance for `phone_hash` into a wallet for `customer_id`, as of `now`.
    ///
    /// Balances that are already past their expiry are left alone. They are forfeited by the next expiration sweep.
    pub async fn convert_shadow_to_real_wallet_at(
        &self,
        customer_id: &CustomerId,
        phone_hash: &PhoneHash,
        now: DateTime<Utc>,
    ) -> Result<ConversionResult, LoyaltyError> {
        let mut unit = self.db.begin_atomic_unit().await?;
        let (shadows, stale): (Vec<_>, Vec<_>) = unit
            .fetch_active_shadow_balances_for_phone(phone_hash)
            .await?
            .into_iter()
            .partition(|s| !s.is_expired_at(now));
        for s in &stale {
            debug!("🔀️ Shadow balance #{} expired at {}. It will not be converted.", s.id, s.expires_at);
        }
        if shadows.is_empty() {
            unit.rollback().await?;
            debug!("🔀️ No active shadow balances to convert for customer {customer_id}");
            return Ok(ConversionResult::nothing_to_convert(customer_id.clone()));
        }
        let mut result = ConversionResult::nothing_to_convert(customer_id.clone());
        for shadow in shadows {
            let wallet = unit.fetch_or_create_wallet(&shadow.merchant_id, customer_id, phone_hash, now).await?;
            let state = merge_states(&wallet.state, &shadow.state)?;
            let shadow = unit.mark_shadow_converted(shadow.id, now).await?;
            let balance = wallet.balance + shadow.amount;
            let wallet = unit.update_wallet(wallet.id, balance, &state, now).await?;
            let entry = NewLedgerEntry::convert(shadow.merchant_id.clone(), wallet.id, shadow.id, shadow.amount, now);
            unit.append_ledger_entry(entry).await?;
            trace!(
                "🔀️ Shadow balance #{} ({}) moved into wallet #{} for merchant {}",
                shadow.id,
                shadow.amount,
                wallet.id,
                shadow.merchant_id
            );
            result.converted += 1;
            result.total_amount += shadow.amount;
            result.wallet_ids.push(wallet.id);
        }
        unit.commit().await?;
        info!(
            "🔀️ Converted {} shadow balances worth {} for customer {customer_id}",
            result.converted, result.total_amount
        );
        Ok(result)
    }
}
