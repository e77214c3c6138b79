use std::{fmt::Debug, time::Instant};

use chrono::{DateTime, Utc};
use log::*;
use loyalty_common::Amount;

use super::errors::LoyaltyError;
use crate::{
    db_types::{NewLedgerEntry, ShadowBalance},
    traits::{AtomicUnit, LoyaltyDatabase, LoyaltyStoreError, SweepResult},
};

/// `ExpirationApi` forfeits shadow balances whose TTL has run out.
///
/// Each balance is expired in its own atomic unit. A failure is logged and counted but does not stop the sweep; the
/// balance is still active and expired, so the next sweep picks it up again.
pub struct ExpirationApi<B> {
    db: B,
}

impl<B> Debug for ExpirationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExpirationApi")
    }
}

impl<B> ExpirationApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> ExpirationApi<B>
where B: LoyaltyDatabase
{
    /// Expires every active shadow balance with `expires_at <= now`.
    ///
    /// Only the initial query can fail the sweep as a whole.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepResult, LoyaltyError> {
        let start = Instant::now();
        debug!("🕰️ Starting expiration sweep");
        let expired = self.db.fetch_expired_shadow_balances(now).await?;
        let mut result = SweepResult { found: expired.len(), ..Default::default() };
        if expired.is_empty() {
            debug!("🕰️ No expired shadow balances found");
        } else {
            info!("🕰️ Found {} expired shadow balances", expired.len());
        }
        for shadow in &expired {
            match self.expire_shadow_balance(shadow, now).await {
                Ok(forfeited) => result.record_expiry(&shadow.merchant_id, forfeited),
                Err(e) => {
                    error!(
                        "🕰️ Could not expire shadow balance #{} for merchant {}. {e}",
                        shadow.id, shadow.merchant_id
                    );
                    result.failed += 1;
                },
            }
        }
        for (merchant_id, breakage) in &result.breakage_by_merchant {
            info!("🕰️ Merchant {merchant_id} breakage: {breakage}");
        }
        result.elapsed = start.elapsed();
        info!(
            "🕰️ Expiration sweep completed in {:?}. Expired: {}, errors: {}, total breakage: {}",
            result.elapsed, result.expired, result.failed, result.total_breakage
        );
        Ok(result)
    }

    async fn expire_shadow_balance(
        &self,
        shadow: &ShadowBalance,
        now: DateTime<Utc>,
    ) -> Result<Amount, LoyaltyStoreError> {
        let marked = forfeit_shadow_balance(&self.db, shadow.id, now).await?;
        trace!("🕰️ Shadow balance #{} expired. {} forfeited", marked.id, marked.amount);
        Ok(marked.amount)
    }
}

/// Marks one shadow balance as terminal and books its amount as breakage, in an atomic unit of its own. Returns the
/// row as it stood when it was marked.
pub(crate) async fn forfeit_shadow_balance<B: LoyaltyDatabase>(
    db: &B,
    shadow_id: i64,
    now: DateTime<Utc>,
) -> Result<ShadowBalance, LoyaltyStoreError> {
    let mut unit = db.begin_atomic_unit().await?;
    let marked = unit.mark_shadow_converted(shadow_id, now).await?;
    let entry = NewLedgerEntry::expire(marked.merchant_id.clone(), marked.id, marked.amount, now);
    unit.append_ledger_entry(entry).await?;
    unit.commit().await?;
    Ok(marked)
}
