use std::fmt::Debug;

use chrono::{DateTime, Utc};
use loyalty_common::Amount;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::strategies::RewardInfo;

/// A purchase event, as delivered by a merchant integration.
#[derive(Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    /// The customer's raw phone number. It is only ever used for the identity lookup and to derive the phone hash.
    pub phone: String,
    pub transaction_id: String,
    pub amount: Amount,
    #[serde(default)]
    pub metadata: Value,
}

impl IngestRequest {
    pub fn new<S: Into<String>>(phone: S, transaction_id: S, amount: Amount) -> Self {
        Self { phone: phone.into(), transaction_id: transaction_id.into(), amount, metadata: Value::Null }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

impl Debug for IngestRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestRequest")
            .field("phone", &"****")
            .field("transaction_id", &self.transaction_id)
            .field("amount", &self.amount)
            .field("metadata", &self.metadata)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub success: bool,
    /// The wallet balance or shadow amount after this transaction.
    pub new_balance: Amount,
    pub is_shadow: bool,
    /// For shadow balances, the instant after which the balance is forfeited unless the customer registers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<RewardInfo>,
    pub message: String,
}

impl IngestResponse {
    pub fn for_wallet(new_balance: Amount, reward: Option<RewardInfo>) -> Self {
        Self {
            success: true,
            new_balance,
            is_shadow: false,
            expires_at: None,
            reward,
            message: "Transaction processed successfully.".into(),
        }
    }

    pub fn for_shadow(new_balance: Amount, expires_at: DateTime<Utc>, reward: Option<RewardInfo>) -> Self {
        let message = format!(
            "Temporary balance saved. Register before {} to keep your rewards.",
            expires_at.format("%d/%m/%Y %H:%M")
        );
        Self { success: true, new_balance, is_shadow: true, expires_at: Some(expires_at), reward, message }
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn shadow_message_names_the_deadline() {
        let expires_at = Utc.with_ymd_and_hms(2026, 10, 14, 15, 4, 0).unwrap();
        let response = IngestResponse::for_shadow(Amount::from(5), expires_at, None);
        assert!(response.is_shadow);
        assert_eq!(response.message, "Temporary balance saved. Register before 14/10/2026 15:04 to keep your rewards.");
    }

    #[test]
    fn request_debug_hides_phone() {
        let request = IngestRequest::new("+15551234567", "tx-1", Amount::from(10));
        let debug = format!("{request:?}");
        assert!(!debug.contains("5551234567"));
        assert!(debug.contains("tx-1"));
    }

    #[test]
    fn request_metadata_is_optional() {
        let request: IngestRequest =
            serde_json::from_str(r#"{"phone":"+1555","transaction_id":"t1","amount":12.5}"#).unwrap();
        assert_eq!(request.amount, Amount::try_from(12.5).unwrap());
        assert!(request.metadata.is_null());
    }
}
