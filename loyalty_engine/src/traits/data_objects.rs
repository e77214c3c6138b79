use std::{collections::BTreeMap, time::Duration};

use loyalty_common::Amount;
use serde::{Deserialize, Serialize};

use crate::db_types::{CustomerId, MerchantId};

/// Shadow-balance outcomes for a single merchant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub merchant_id: MerchantId,
    pub total_shadow_balances: i64,
    pub converted_count: i64,
    pub expired_count: i64,
    /// Shadow balances that are neither terminal nor past their expiry.
    pub active_count: i64,
    pub total_converted_amount: Amount,
    /// The value forfeited by expired shadow balances (a positive number).
    pub total_breakage: Amount,
    /// Converted balances as a percentage of all shadow balances.
    pub conversion_rate: f64,
}

impl ConversionStats {
    pub fn with_rate(mut self) -> Self {
        self.conversion_rate = if self.total_shadow_balances > 0 {
            self.converted_count as f64 / self.total_shadow_balances as f64 * 100.0
        } else {
            0.0
        };
        self
    }
}

/// Breakage across all merchants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpirationMetrics {
    pub total_expired: i64,
    pub total_breakage: Amount,
    pub average_breakage: Amount,
}

/// The outcome of one expiration sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepResult {
    /// The number of expired shadow balances that were found.
    pub found: usize,
    pub expired: usize,
    pub failed: usize,
    pub total_breakage: Amount,
    pub breakage_by_merchant: BTreeMap<MerchantId, Amount>,
    pub elapsed: Duration,
}

impl SweepResult {
    pub(crate) fn record_expiry(&mut self, merchant_id: &MerchantId, forfeited: Amount) {
        self.expired += 1;
        self.total_breakage += forfeited;
        *self.breakage_by_merchant.entry(merchant_id.clone()).or_default() += forfeited;
    }
}

/// The outcome of converting a customer's shadow balances into real wallets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub customer_id: CustomerId,
    pub converted: usize,
    pub total_amount: Amount,
    /// The wallets that received a shadow balance, one per merchant.
    pub wallet_ids: Vec<i64>,
}

impl ConversionResult {
    pub fn nothing_to_convert(customer_id: CustomerId) -> Self {
        Self { customer_id, converted: 0, total_amount: Amount::zero(), wallet_ids: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.converted == 0
    }
}
