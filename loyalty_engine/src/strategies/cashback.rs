use loyalty_common::Amount;
use serde::{Deserialize, Serialize};

use super::{below_minimum, RewardInfo, RewardRule, RuleOutcome, StrategyInput};
use crate::db_types::CampaignType;

/// Pays back a percentage of every qualifying purchase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CashbackStrategy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashbackConfig {
    /// Percentage of the purchase that is paid back, in the range (0, 100].
    pub percentage: f64,
    /// A per-transaction cap. Zero means "no cap".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cashback: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_purchase: Option<Amount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CashbackState {
    #[serde(default)]
    pub total_earned: Amount,
    #[serde(default)]
    pub total_redeemed: Amount,
}

impl RewardRule for CashbackStrategy {
    type Config = CashbackConfig;
    type State = CashbackState;

    const CAMPAIGN_TYPE: CampaignType = CampaignType::Cashback;

    fn check_config(config: &CashbackConfig) -> Result<(), String> {
        if config.percentage <= 0.0 || config.percentage > 100.0 {
            return Err("percentage must be greater than 0 and at most 100".into());
        }
        if matches!(config.max_cashback, Some(max) if max < Amount::zero()) {
            return Err("max_cashback cannot be negative".into());
        }
        Ok(())
    }

    fn apply(config: &CashbackConfig, mut state: CashbackState, input: &StrategyInput<'_>) -> RuleOutcome<CashbackState> {
        if below_minimum(config.min_purchase, input.amount) {
            return RuleOutcome::Skipped;
        }
        let mut cashback = input.amount * (config.percentage / 100.0);
        if let Some(max) = config.max_cashback.filter(Amount::is_positive) {
            cashback = cashback.min(max);
        }
        state.total_earned += cashback;
        let reward = RewardInfo {
            reward_type: "cashback".into(),
            amount: cashback,
            description: format!("{:.1}% cashback on a purchase of {}", config.percentage, input.amount),
        };
        RuleOutcome::Applied { delta: cashback, state, reward: Some(reward) }
    }
}

#[cfg(test)]
mod test {
    use loyalty_common::Amount;
    use serde_json::json;

    use crate::{
        db_types::CampaignType,
        strategies::{
            test_support::{campaign, run_all},
            CashbackState,
            StrategyRegistry,
        },
    };

    fn is_valid(config: serde_json::Value) -> bool {
        StrategyRegistry::standard().validate(CampaignType::Cashback, &config).is_ok()
    }

    #[test]
    fn config_validation() {
        assert!(is_valid(json!({"percentage": 5})));
        assert!(is_valid(json!({"percentage": 100, "max_cashback": 0})));
        assert!(is_valid(json!({"percentage": 0.5, "max_cashback": 20, "min_purchase": 10})));
        assert!(!is_valid(json!({"percentage": 0})));
        assert!(!is_valid(json!({"percentage": -1})));
        assert!(!is_valid(json!({"percentage": 100.01})));
        assert!(!is_valid(json!({"percentage": 5, "max_cashback": -1})));
        assert!(!is_valid(json!({"max_cashback": 20})));
    }

    #[test]
    fn large_purchase_is_capped() {
        let campaign = campaign(CampaignType::Cashback, json!({"percentage": 5, "max_cashback": 20}));
        let results = run_all(&campaign, &[1000.0]);
        assert_eq!(results[0].balance_delta, Amount::from(20));
        let reward = results[0].reward.as_ref().unwrap();
        assert_eq!(reward.reward_type, "cashback");
        assert_eq!(reward.amount, Amount::from(20));
    }

    #[test]
    fn uncapped_cashback_is_a_plain_percentage() {
        let campaign = campaign(CampaignType::Cashback, json!({"percentage": 10, "max_cashback": 0}));
        let results = run_all(&campaign, &[1000.0, 50.0]);
        assert_eq!(results[0].balance_delta, Amount::from(100));
        assert_eq!(results[1].balance_delta, Amount::from(5));
        let state: CashbackState = serde_json::from_value(results[1].new_state.clone()).unwrap();
        assert_eq!(state.total_earned, Amount::from(105));
        assert_eq!(state.total_redeemed, Amount::zero());
    }

    #[test]
    fn delta_never_exceeds_the_cap() {
        let campaign = campaign(CampaignType::Cashback, json!({"percentage": 25, "max_cashback": 7.5}));
        let amounts = [1.0, 10.0, 29.0, 30.0, 31.0, 500.0, 1e6];
        for (amount, result) in amounts.iter().zip(run_all(&campaign, &amounts)) {
            let expected = (amount * 0.25).min(7.5);
            assert!((result.balance_delta.value() - expected).abs() < 1e-9, "{amount} gave {}", result.balance_delta);
            assert!(result.balance_delta.value() <= 7.5);
        }
    }

    #[test]
    fn purchases_below_minimum_are_ignored() {
        let campaign = campaign(CampaignType::Cashback, json!({"percentage": 5, "min_purchase": 100}));
        let results = run_all(&campaign, &[99.0, 100.0]);
        assert!(!results[0].state_changed);
        assert!(results[0].reward.is_none());
        assert_eq!(results[0].balance_delta, Amount::zero());
        assert!(results[1].state_changed);
        assert_eq!(results[1].balance_delta, Amount::from(5));
    }
}
