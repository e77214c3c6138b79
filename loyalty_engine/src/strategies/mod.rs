//! # Reward strategies
//!
//! A reward strategy turns one purchase into a balance change. Every campaign type has exactly one strategy, and each
//! strategy owns the schema of both its campaign configuration and the progress state that is stored alongside a
//! wallet or shadow balance.
//!
//! Strategies are pure: they never touch storage, never block, and always return the same result for the same input.
//! The ingestion engine is responsible for persisting what they return.
//!
//! * [`PunchCardStrategy`]: every qualifying purchase adds a punch; a full card pays out a fixed reward.
//! * [`CashbackStrategy`]: a percentage of each qualifying purchase, optionally capped.
//! * [`ProgressiveStrategy`]: points per unit spent, scaled by the multiplier of the customer's tier.
//!
//! Strategies are looked up by [`CampaignType`] in an immutable [`StrategyRegistry`] that is built once at startup.
mod cashback;
mod progressive;
mod punch_card;
mod registry;

pub use cashback::{CashbackConfig, CashbackState, CashbackStrategy};
use log::*;
use loyalty_common::Amount;
pub use progressive::{ProgressiveConfig, ProgressiveState, ProgressiveStrategy, ProgressiveTier};
pub use punch_card::{PunchCardConfig, PunchCardRewardType, PunchCardState, PunchCardStrategy};
pub use registry::{RewardStrategy, StrategyRegistry};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::db_types::{Campaign, CampaignType};

#[derive(Debug, Clone, Error)]
pub enum StrategyError {
    #[error("Invalid {0} campaign configuration. {1}")]
    InvalidConfig(CampaignType, String),
    #[error("The {0} strategy could not process the transaction. {1}")]
    Execution(CampaignType, String),
}

/// Everything a strategy needs to evaluate one purchase.
#[derive(Debug, Clone)]
pub struct StrategyInput<'a> {
    pub campaign: &'a Campaign,
    pub transaction_id: &'a str,
    pub amount: Amount,
    /// The progress state currently stored with the wallet or shadow balance.
    pub current_state: &'a Value,
    pub metadata: &'a Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardInfo {
    #[serde(rename = "type")]
    pub reward_type: String,
    pub amount: Amount,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct StrategyResult {
    /// The amount to add to the wallet or shadow balance.
    pub balance_delta: Amount,
    pub new_state: Value,
    pub reward: Option<RewardInfo>,
    pub state_changed: bool,
}

impl StrategyResult {
    fn unchanged(state: &Value) -> Self {
        Self { balance_delta: Amount::zero(), new_state: state.clone(), reward: None, state_changed: false }
    }
}

/// What a rule decided for one purchase, before the state is serialized.
pub(crate) enum RuleOutcome<S> {
    /// The purchase does not qualify. Nothing changes.
    Skipped,
    Applied { delta: Amount, state: S, reward: Option<RewardInfo> },
}

/// The typed core of a strategy. Implementors only deal with their own config and state types; parsing, validation
/// plumbing and serialization live in [`validate_config`] and [`execute_rule`].
pub(crate) trait RewardRule {
    type Config: DeserializeOwned;
    type State: DeserializeOwned + Serialize + Default;

    const CAMPAIGN_TYPE: CampaignType;

    fn check_config(config: &Self::Config) -> Result<(), String>;

    fn apply(config: &Self::Config, state: Self::State, input: &StrategyInput<'_>) -> RuleOutcome<Self::State>;
}

fn parse_config<R: RewardRule>(config: &Value) -> Result<R::Config, StrategyError> {
    R::Config::deserialize(config).map_err(|e| StrategyError::InvalidConfig(R::CAMPAIGN_TYPE, e.to_string()))
}

pub(crate) fn validate_config<R: RewardRule>(config: &Value) -> Result<(), StrategyError> {
    let config = parse_config::<R>(config)?;
    R::check_config(&config).map_err(|e| StrategyError::InvalidConfig(R::CAMPAIGN_TYPE, e))
}

/// Missing or unreadable state is treated as a fresh, zeroed state rather than an error.
fn load_state<R: RewardRule>(state: &Value) -> R::State {
    if state.is_null() {
        return R::State::default();
    }
    R::State::deserialize(state).unwrap_or_else(|e| {
        debug!("🧮️ Stored {} state could not be read ({e}). Starting from a fresh state.", R::CAMPAIGN_TYPE);
        R::State::default()
    })
}

pub(crate) fn execute_rule<R: RewardRule>(input: &StrategyInput<'_>) -> Result<StrategyResult, StrategyError> {
    let config = parse_config::<R>(&input.campaign.config)?;
    let state = load_state::<R>(input.current_state);
    match R::apply(&config, state, input) {
        RuleOutcome::Skipped => {
            trace!(
                "🧮️ Transaction {} does not qualify for campaign #{}. Nothing to do.",
                input.transaction_id,
                input.campaign.id
            );
            Ok(StrategyResult::unchanged(input.current_state))
        },
        RuleOutcome::Applied { delta, state, reward } => {
            let new_state =
                serde_json::to_value(state).map_err(|e| StrategyError::Execution(R::CAMPAIGN_TYPE, e.to_string()))?;
            trace!(
                "🧮️ Transaction {} on campaign #{} earns {delta}. New state: {new_state}",
                input.transaction_id,
                input.campaign.id
            );
            Ok(StrategyResult { balance_delta: delta, new_state, reward, state_changed: true })
        },
    }
}

/// `true` if a minimum purchase is configured (and positive) and `amount` falls below it.
fn below_minimum(min_purchase: Option<Amount>, amount: Amount) -> bool {
    matches!(min_purchase, Some(min) if min.is_positive() && amount < min)
}
