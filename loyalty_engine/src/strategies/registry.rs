use std::collections::HashMap;

use log::*;
use serde_json::Value;

use super::{
    execute_rule,
    validate_config,
    CashbackStrategy,
    ProgressiveStrategy,
    PunchCardStrategy,
    StrategyError,
    StrategyInput,
    StrategyResult,
};
use crate::db_types::CampaignType;

/// One of the supported reward strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardStrategy {
    PunchCard(PunchCardStrategy),
    Cashback(CashbackStrategy),
    Progressive(ProgressiveStrategy),
}

impl RewardStrategy {
    pub fn for_campaign_type(campaign_type: CampaignType) -> Self {
        match campaign_type {
            CampaignType::PunchCard => Self::PunchCard(PunchCardStrategy),
            CampaignType::Cashback => Self::Cashback(CashbackStrategy),
            CampaignType::Progressive => Self::Progressive(ProgressiveStrategy),
        }
    }

    pub fn campaign_type(&self) -> CampaignType {
        match self {
            Self::PunchCard(_) => CampaignType::PunchCard,
            Self::Cashback(_) => CampaignType::Cashback,
            Self::Progressive(_) => CampaignType::Progressive,
        }
    }

    /// Checks that `config` is a well-formed and sensible configuration for this strategy.
    pub fn validate(&self, config: &Value) -> Result<(), StrategyError> {
        match self {
            Self::PunchCard(_) => validate_config::<PunchCardStrategy>(config),
            Self::Cashback(_) => validate_config::<CashbackStrategy>(config),
            Self::Progressive(_) => validate_config::<ProgressiveStrategy>(config),
        }
    }

    pub fn execute(&self, input: &StrategyInput<'_>) -> Result<StrategyResult, StrategyError> {
        match self {
            Self::PunchCard(_) => execute_rule::<PunchCardStrategy>(input),
            Self::Cashback(_) => execute_rule::<CashbackStrategy>(input),
            Self::Progressive(_) => execute_rule::<ProgressiveStrategy>(input),
        }
    }
}

/// Maps campaign types to the strategy that evaluates them. The registry is built once and never modified afterwards,
/// so it can be shared freely between tasks.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<CampaignType, RewardStrategy>,
}

impl StrategyRegistry {
    /// Builds a registry from the given strategies. If two strategies claim the same campaign type, the last one wins.
    pub fn new<I: IntoIterator<Item = RewardStrategy>>(strategies: I) -> Self {
        let strategies = strategies.into_iter().map(|s| (s.campaign_type(), s)).collect::<HashMap<_, _>>();
        debug!("🧮️ Strategy registry created with {} strategies", strategies.len());
        Self { strategies }
    }

    /// A registry holding every built-in strategy.
    pub fn standard() -> Self {
        Self::new([CampaignType::PunchCard, CampaignType::Cashback, CampaignType::Progressive]
            .into_iter()
            .map(RewardStrategy::for_campaign_type))
    }

    pub fn get(&self, campaign_type: CampaignType) -> Option<&RewardStrategy> {
        self.strategies.get(&campaign_type)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Validates a campaign configuration against the strategy registered for `campaign_type`.
    pub fn validate(&self, campaign_type: CampaignType, config: &Value) -> Result<(), StrategyError> {
        let strategy = self.get(campaign_type).ok_or_else(|| {
            StrategyError::InvalidConfig(campaign_type, "No strategy is registered for this campaign type".into())
        })?;
        strategy.validate(config)
    }
}
