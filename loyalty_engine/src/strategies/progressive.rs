use loyalty_common::Amount;
use serde::{Deserialize, Serialize};

use super::{RewardInfo, RewardRule, RuleOutcome, StrategyInput};
use crate::db_types::CampaignType;

/// Customers climb tiers as their transaction count grows. Every purchase earns `amount * base_points_ratio`, scaled
/// by the multiplier of the tier the customer is in after the purchase. Reaching a new tier pays that tier's bonus
/// once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressiveStrategy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressiveTier {
    pub name: String,
    pub min_transactions: u32,
    pub reward_multiplier: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonus_points: Option<Amount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressiveConfig {
    pub tiers: Vec<ProgressiveTier>,
    pub base_points_ratio: f64,
}

impl ProgressiveConfig {
    /// The index of the highest tier whose threshold has been reached. A count below every threshold maps to the
    /// first tier.
    pub fn tier_for(&self, transaction_count: u32) -> usize {
        self.tiers.iter().rposition(|t| t.min_transactions <= transaction_count).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressiveState {
    #[serde(default)]
    pub transaction_count: u32,
    #[serde(default)]
    pub current_tier: usize,
    #[serde(default)]
    pub total_points: Amount,
}

impl RewardRule for ProgressiveStrategy {
    type Config = ProgressiveConfig;
    type State = ProgressiveState;

    const CAMPAIGN_TYPE: CampaignType = CampaignType::Progressive;

    fn check_config(config: &ProgressiveConfig) -> Result<(), String> {
        if config.tiers.is_empty() {
            return Err("at least one tier is required".into());
        }
        if config.base_points_ratio <= 0.0 {
            return Err("base_points_ratio must be greater than 0".into());
        }
        if config.tiers.windows(2).any(|w| w[1].min_transactions <= w[0].min_transactions) {
            return Err("tiers must be sorted by min_transactions in strictly ascending order".into());
        }
        Ok(())
    }

    fn apply(
        config: &ProgressiveConfig,
        mut state: ProgressiveState,
        input: &StrategyInput<'_>,
    ) -> RuleOutcome<ProgressiveState> {
        state.transaction_count = state.transaction_count.saturating_add(1);
        let previous_tier = state.current_tier;
        state.current_tier = config.tier_for(state.transaction_count);
        let (tier_name, multiplier, bonus) = match config.tiers.get(state.current_tier) {
            Some(tier) => {
                let bonus = if state.current_tier > previous_tier {
                    tier.bonus_points.unwrap_or_default()
                } else {
                    Amount::zero()
                };
                (tier.name.as_str(), tier.reward_multiplier, bonus)
            },
            None => ("Base", 1.0, Amount::zero()),
        };
        let points = input.amount * (config.base_points_ratio * multiplier) + bonus;
        state.total_points += points;
        let mut description = format!("Earned {points} points in tier {tier_name}");
        if bonus.is_positive() {
            description.push_str(&format!(" (includes a {bonus} point bonus for reaching a new tier)"));
        }
        let reward = RewardInfo { reward_type: "points".into(), amount: points, description };
        RuleOutcome::Applied { delta: points, state, reward: Some(reward) }
    }
}
