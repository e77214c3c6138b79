use chrono::{DateTime, Utc};
use log::*;
use loyalty_common::Amount;
use serde_json::Value;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{CustomerId, MerchantId, PhoneHash, Wallet},
    traits::LoyaltyStoreError,
};

pub async fn fetch_wallet(
    merchant_id: &MerchantId,
    customer_id: &CustomerId,
    conn: &mut SqliteConnection,
) -> Result<Option<Wallet>, LoyaltyStoreError> {
    let wallet = sqlx::query_as("SELECT * FROM wallets WHERE merchant_id = $1 AND customer_id = $2")
        .bind(merchant_id)
        .bind(customer_id)
        .fetch_optional(conn)
        .await?;
    Ok(wallet)
}

/// Returns the wallet for the merchant and customer, creating an empty one first if necessary. This function is
/// idempotent due to a uniqueness constraint on `(merchant_id, customer_id)`.
pub async fn fetch_or_create_wallet(
    merchant_id: &MerchantId,
    customer_id: &CustomerId,
    phone_hash: &PhoneHash,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Wallet, LoyaltyStoreError> {
    let inserted = sqlx::query(
        r#"
    INSERT INTO wallets (merchant_id, customer_id, phone_hash, balance, state, created_at, updated_at)
    VALUES ($1, $2, $3, 0.0, '{}', $4, $4)
    ON CONFLICT (merchant_id, customer_id) DO NOTHING
    "#,
    )
    .bind(merchant_id)
    .bind(customer_id)
    .bind(phone_hash)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    if inserted > 0 {
        debug!("🗃️ New wallet created for customer {customer_id} at merchant {merchant_id}");
    }
    fetch_wallet(merchant_id, customer_id, conn)
        .await?
        .ok_or_else(|| LoyaltyStoreError::DatabaseError(format!("Wallet for {customer_id} vanished after insert")))
}

pub async fn update_wallet(
    wallet_id: i64,
    balance: Amount,
    state: &Value,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Wallet, LoyaltyStoreError> {
    let wallet = sqlx::query_as("UPDATE wallets SET balance = $1, state = $2, updated_at = $3 WHERE id = $4 RETURNING *")
        .bind(balance)
        .bind(Json(state))
        .bind(now)
        .bind(wallet_id)
        .fetch_optional(conn)
        .await?;
    wallet.ok_or(LoyaltyStoreError::WalletNotFound(wallet_id))
}
