use std::fmt::Display;

use loyalty_common::Amount;
use serde::{Deserialize, Serialize};

use super::{below_minimum, RewardInfo, RewardRule, RuleOutcome, StrategyInput};
use crate::db_types::CampaignType;

/// "Buy N, get a reward". Each qualifying purchase adds a punch; when the card is full the reward is paid out and the
/// card starts over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PunchCardStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PunchCardRewardType {
    Points,
    Discount,
    FreeItem,
}

impl Display for PunchCardRewardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Points => write!(f, "points"),
            Self::Discount => write!(f, "discount"),
            Self::FreeItem => write!(f, "free_item"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PunchCardConfig {
    pub required_punches: u32,
    pub reward_amount: Amount,
    pub reward_type: PunchCardRewardType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_purchase: Option<Amount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PunchCardState {
    #[serde(default)]
    pub current_punches: u32,
    #[serde(default)]
    pub total_redeemed: u32,
}

impl RewardRule for PunchCardStrategy {
    type Config = PunchCardConfig;
    type State = PunchCardState;

    const CAMPAIGN_TYPE: CampaignType = CampaignType::PunchCard;

    fn check_config(config: &PunchCardConfig) -> Result<(), String> {
        if config.required_punches == 0 {
            return Err("required_punches must be greater than 0".into());
        }
        if !config.reward_amount.is_positive() {
            return Err("reward_amount must be greater than 0".into());
        }
        Ok(())
    }

    fn apply(
        config: &PunchCardConfig,
        mut state: PunchCardState,
        input: &StrategyInput<'_>,
    ) -> RuleOutcome<PunchCardState> {
        if below_minimum(config.min_purchase, input.amount) {
            return RuleOutcome::Skipped;
        }
        state.current_punches += 1;
        if state.current_punches < config.required_punches {
            return RuleOutcome::Applied { delta: Amount::zero(), state, reward: None };
        }
        state.current_punches = 0;
        state.total_redeemed += 1;
        let reward = RewardInfo {
            reward_type: config.reward_type.to_string(),
            amount: config.reward_amount,
            description: format!("Completed {} purchases. Congratulations!", config.required_punches),
        };
        RuleOutcome::Applied { delta: config.reward_amount, state, reward: Some(reward) }
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
            PunchCardState,
            StrategyError,
            StrategyRegistry,
        },
    };

    fn validate(config: serde_json::Value) -> Result<(), StrategyError> {
        StrategyRegistry::standard().validate(CampaignType::PunchCard, &config)
    }

    #[test]
    fn config_validation() {
        assert!(validate(json!({"required_punches": 10, "reward_amount": 1, "reward_type": "free_item"})).is_ok());
        assert!(validate(json!({"required_punches": 0, "reward_amount": 1, "reward_type": "points"})).is_err());
        assert!(validate(json!({"required_punches": -2, "reward_amount": 1, "reward_type": "points"})).is_err());
        assert!(validate(json!({"required_punches": 3, "reward_amount": 0, "reward_type": "points"})).is_err());
        assert!(validate(json!({"required_punches": 3, "reward_amount": 5, "reward_type": "voucher"})).is_err());
        assert!(validate(json!({"reward_amount": 5, "reward_type": "points"})).is_err());
    }

    #[test]
    fn third_punch_pays_out_and_resets() {
        let campaign =
            campaign(CampaignType::PunchCard, json!({"required_punches": 3, "reward_amount": 10, "reward_type": "points"}));
        let results = run_all(&campaign, &[4.0, 12.0, 7.5]);
        assert_eq!(results[0].balance_delta, Amount::zero());
        assert_eq!(results[1].balance_delta, Amount::zero());
        assert!(results[0].reward.is_none());
        assert!(results[1].reward.is_none());
        let third = &results[2];
        assert_eq!(third.balance_delta, Amount::from(10));
        let reward = third.reward.as_ref().unwrap();
        assert_eq!(reward.reward_type, "points");
        assert_eq!(reward.amount, Amount::from(10));
        let state: PunchCardState = serde_json::from_value(third.new_state.clone()).unwrap();
        assert_eq!(state, PunchCardState { current_punches: 0, total_redeemed: 1 });
    }

    #[test]
    fn reward_fires_exactly_once_per_full_card() {
        let campaign =
            campaign(CampaignType::PunchCard, json!({"required_punches": 4, "reward_amount": 2, "reward_type": "discount"}));
        let results = run_all(&campaign, &[1.0; 9]);
        let rewards: Vec<usize> =
            results.iter().enumerate().filter(|(_, r)| r.reward.is_some()).map(|(i, _)| i).collect();
        assert_eq!(rewards, vec![3, 7]);
        let state: PunchCardState = serde_json::from_value(results[8].new_state.clone()).unwrap();
        assert_eq!(state, PunchCardState { current_punches: 1, total_redeemed: 2 });
    }

    #[test]
    fn purchases_below_minimum_do_not_punch() {
        let campaign = campaign(
            CampaignType::PunchCard,
            json!({"required_punches": 2, "reward_amount": 5, "reward_type": "points", "min_purchase": 20}),
        );
        let results = run_all(&campaign, &[25.0, 19.99, 5.0, 20.0]);
        assert!(results[0].state_changed);
        assert!(!results[1].state_changed);
        assert!(!results[2].state_changed);
        assert_eq!(results[1].new_state, results[0].new_state);
        assert_eq!(results[2].balance_delta, Amount::zero());
        assert_eq!(results[3].balance_delta, Amount::from(5));
    }

    #[test]
    fn corrupt_state_starts_a_fresh_card() {
        use crate::strategies::StrategyInput;
        let campaign =
            campaign(CampaignType::PunchCard, json!({"required_punches": 2, "reward_amount": 1, "reward_type": "points"}));
        let registry = StrategyRegistry::standard();
        let strategy = registry.get(CampaignType::PunchCard).unwrap();
        let state = json!({"current_punches": "lots"});
        let metadata = json!({});
        let input = StrategyInput {
            campaign: &campaign,
            transaction_id: "tx-1",
            amount: Amount::from(3),
            current_state: &state,
            metadata: &metadata,
        };
        let result = strategy.execute(&input).unwrap();
        let state: PunchCardState = serde_json::from_value(result.new_state).unwrap();
        assert_eq!(state.current_punches, 1);
    }
}
