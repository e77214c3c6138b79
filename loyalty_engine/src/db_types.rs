use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use loyalty_common::Amount;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Type};
use thiserror::Error;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
        #[sqlx(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

//--------------------------------------   Identifiers       ---------------------------------------------------------
string_id!(
    /// The merchant that owns a campaign, wallet or shadow balance.
    MerchantId
);
string_id!(
    /// The identifier the external identity system assigns to a registered customer.
    CustomerId
);
string_id!(
    /// SHA-256 (hex) of a customer's phone number. This is the only customer key that is ever persisted for
    /// unregistered customers.
    PhoneHash
);

#[derive(Debug, Clone, Error)]
#[error("Invalid enum value: {0}")]
pub struct ConversionError(String);

//--------------------------------------   CampaignType      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignType {
    /// Buy N, get a reward.
    PunchCard,
    /// A percentage of every purchase is credited back.
    Cashback,
    /// Points per purchase, with multipliers that grow as the customer climbs tiers.
    Progressive,
}

impl Display for CampaignType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignType::PunchCard => write!(f, "PUNCH_CARD"),
            CampaignType::Cashback => write!(f, "CASHBACK"),
            CampaignType::Progressive => write!(f, "PROGRESSIVE"),
        }
    }
}

impl FromStr for CampaignType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PUNCH_CARD" => Ok(Self::PunchCard),
            "CASHBACK" => Ok(Self::Cashback),
            "PROGRESSIVE" => Ok(Self::Progressive),
            s => Err(ConversionError(format!("Invalid campaign type: {s}"))),
        }
    }
}

//--------------------------------------  TransactionType    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// A purchase credited a wallet or shadow balance.
    Earn,
    /// A reward was spent.
    Redeem,
    /// A shadow balance passed its TTL unconverted. The amount is the (negative) breakage.
    Expire,
    /// A shadow balance was migrated into a real wallet. The amount is the (positive) transferred value.
    Convert,
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Earn => write!(f, "EARN"),
            TransactionType::Redeem => write!(f, "REDEEM"),
            TransactionType::Expire => write!(f, "EXPIRE"),
            TransactionType::Convert => write!(f, "CONVERT"),
        }
    }
}

impl FromStr for TransactionType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EARN" => Ok(Self::Earn),
            "REDEEM" => Ok(Self::Redeem),
            "EXPIRE" => Ok(Self::Expire),
            "CONVERT" => Ok(Self::Convert),
            s => Err(ConversionError(format!("Invalid transaction type: {s}"))),
        }
    }
}

//--------------------------------------      Campaign       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: i64,
    pub merchant_id: MerchantId,
    pub name: String,
    pub campaign_type: CampaignType,
    /// Strategy-specific configuration. The schema depends on `campaign_type`.
    #[sqlx(json)]
    pub config: Value,
    pub is_active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// A campaign is running if it is flagged as active and `now` falls inside its (optional) validity window.
    pub fn is_running_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active &&
            self.starts_at.map(|s| s <= now).unwrap_or(true) &&
            self.ends_at.map(|e| e >= now).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCampaign {
    pub merchant_id: MerchantId,
    pub name: String,
    pub campaign_type: CampaignType,
    pub config: Value,
    pub is_active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl NewCampaign {
    pub fn new(merchant_id: MerchantId, name: &str, campaign_type: CampaignType, config: Value) -> Self {
        Self {
            merchant_id,
            name: name.to_string(),
            campaign_type,
            config,
            is_active: true,
            starts_at: None,
            ends_at: None,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn with_window(mut self, starts_at: Option<DateTime<Utc>>, ends_at: Option<DateTime<Utc>>) -> Self {
        self.starts_at = starts_at;
        self.ends_at = ends_at;
        self
    }
}

//--------------------------------------       Wallet        ---------------------------------------------------------
/// A permanent balance for a registered customer at one merchant.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub merchant_id: MerchantId,
    pub customer_id: CustomerId,
    pub phone_hash: PhoneHash,
    pub balance: Amount,
    /// Strategy-specific progress (punch counts, tier index, and so on).
    #[sqlx(json)]
    pub state: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------   ShadowBalance     ---------------------------------------------------------
/// A temporary balance for a customer that is not (yet) registered, keyed by merchant and phone hash.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ShadowBalance {
    pub id: i64,
    pub merchant_id: MerchantId,
    pub phone_hash: PhoneHash,
    pub amount: Amount,
    #[sqlx(json)]
    pub state: Value,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the balance reaches a terminal state, either by conversion into a wallet or by expiry.
    pub converted_at: Option<DateTime<Utc>>,
}

impl ShadowBalance {
    pub fn is_active(&self) -> bool {
        self.converted_at.is_none()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

//--------------------------------------    LedgerEntry      ---------------------------------------------------------
/// An immutable row in the transactions ledger.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub merchant_id: MerchantId,
    pub campaign_id: Option<i64>,
    pub wallet_id: Option<i64>,
    pub shadow_balance_id: Option<i64>,
    pub transaction_type: TransactionType,
    pub amount: Amount,
    #[sqlx(json)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// A ledger entry that has not been written yet. Use the constructors, which guarantee that the right references are
/// populated for each transaction type.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub merchant_id: MerchantId,
    pub campaign_id: Option<i64>,
    pub wallet_id: Option<i64>,
    pub shadow_balance_id: Option<i64>,
    pub transaction_type: TransactionType,
    pub amount: Amount,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl NewLedgerEntry {
    pub fn earn_for_wallet(
        merchant_id: MerchantId,
        campaign_id: i64,
        wallet_id: i64,
        amount: Amount,
        metadata: Value,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            merchant_id,
            campaign_id: Some(campaign_id),
            wallet_id: Some(wallet_id),
            shadow_balance_id: None,
            transaction_type: TransactionType::Earn,
            amount,
            metadata,
            created_at: at,
        }
    }

    pub fn earn_for_shadow(
        merchant_id: MerchantId,
        campaign_id: i64,
        shadow_balance_id: i64,
        amount: Amount,
        metadata: Value,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            merchant_id,
            campaign_id: Some(campaign_id),
            wallet_id: None,
            shadow_balance_id: Some(shadow_balance_id),
            transaction_type: TransactionType::Earn,
            amount,
            metadata,
            created_at: at,
        }
    }

    /// Records breakage. `forfeited` is the accumulated shadow amount; the entry stores its negation.
    pub fn expire(merchant_id: MerchantId, shadow_balance_id: i64, forfeited: Amount, at: DateTime<Utc>) -> Self {
        Self {
            merchant_id,
            campaign_id: None,
            wallet_id: None,
            shadow_balance_id: Some(shadow_balance_id),
            transaction_type: TransactionType::Expire,
            amount: -forfeited,
            metadata: serde_json::json!({ "expired_at": at.to_rfc3339() }),
            created_at: at,
        }
    }

    pub fn convert(
        merchant_id: MerchantId,
        wallet_id: i64,
        shadow_balance_id: i64,
        transferred: Amount,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            merchant_id,
            campaign_id: None,
            wallet_id: Some(wallet_id),
            shadow_balance_id: Some(shadow_balance_id),
            transaction_type: TransactionType::Convert,
            amount: transferred,
            metadata: serde_json::json!({
                "converted_from_shadow": shadow_balance_id,
                "conversion_date": at.to_rfc3339(),
            }),
            created_at: at,
        }
    }
}
