use std::time::Duration;

use chrono::{DateTime, Utc};
use loyalty_common::Amount;
use thiserror::Error;

use crate::{
    db_types::{CampaignType, MerchantId},
    helpers::MergeError,
    strategies::StrategyError,
    traits::{IdentityResolverError, LoyaltyStoreError},
};

#[derive(Debug, Clone, Error)]
pub enum LoyaltyError {
    #[error("The transaction amount must be greater than zero, but was {0}")]
    InvalidAmount(Amount),
    #[error("Merchant {0} does not have an active campaign")]
    NoActiveCampaign(MerchantId),
    #[error("No reward strategy is registered for {0} campaigns")]
    UnknownStrategy(CampaignType),
    #[error("Campaign #{campaign_id} cannot run. {source}")]
    InvalidCampaignConfig { campaign_id: i64, source: StrategyError },
    #[error("Campaign #{campaign_id} failed to process the transaction. {source}")]
    StrategyFailed { campaign_id: i64, source: StrategyError },
    #[error("Shadow balance #{shadow_id} expired at {expires_at} and can no longer earn rewards")]
    ShadowExpired { shadow_id: i64, expires_at: DateTime<Utc> },
    #[error("Could not determine whether the customer is registered. {0}")]
    IdentityResolver(#[from] IdentityResolverError),
    #[error("Could not merge shadow balance progress into the wallet. {0}")]
    StateMerge(#[from] MergeError),
    #[error("{0}")]
    Storage(#[from] LoyaltyStoreError),
    #[error("The operation did not complete within {0:?}")]
    Timeout(Duration),
}

impl LoyaltyError {
    /// These errors are caused by the request, the merchant's program or the customer's shadow balance rather than by
    /// a failing dependency. They are reported back to the caller.
    pub fn is_caller_fixable(&self) -> bool {
        matches!(self, Self::InvalidAmount(_) | Self::NoActiveCampaign(_) | Self::ShadowExpired { .. })
    }

    /// These errors are transient. No balance was credited, and the call can be repeated.
    ///
    /// A stale shadow balance is forfeited before [`LoyaltyError::ShadowExpired`] is returned, so the next attempt earns
    /// into a fresh one.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ShadowExpired { .. } => true,
            Self::IdentityResolver(IdentityResolverError::Unavailable(_)) => true,
            Self::Storage(LoyaltyStoreError::DatabaseError(_) | LoyaltyStoreError::ShadowBalanceNotActive(_)) => true,
            Self::Timeout(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_classes() {
        assert!(LoyaltyError::InvalidAmount(Amount::zero()).is_caller_fixable());
        assert!(LoyaltyError::NoActiveCampaign("m1".into()).is_caller_fixable());
        assert!(!LoyaltyError::NoActiveCampaign("m1".into()).is_retryable());
        let expired = LoyaltyError::ShadowExpired { shadow_id: 1, expires_at: Utc::now() };
        assert!(expired.is_caller_fixable());
        assert!(expired.is_retryable());
        assert!(LoyaltyError::Timeout(Duration::from_secs(1)).is_retryable());
        let unavailable = IdentityResolverError::Unavailable("connection refused".into());
        assert!(LoyaltyError::from(unavailable).is_retryable());
        let bad_id = IdentityResolverError::InvalidCustomerId(String::new());
        assert!(!LoyaltyError::from(bad_id).is_retryable());
        let lost_race = LoyaltyStoreError::ShadowBalanceNotActive(4);
        assert!(LoyaltyError::from(lost_race).is_retryable());
        let config = StrategyError::InvalidConfig(CampaignType::Cashback, "percentage".into());
        let err = LoyaltyError::InvalidCampaignConfig { campaign_id: 3, source: config };
        assert!(!err.is_caller_fixable());
        assert!(!err.is_retryable());
    }
}
