use chrono::{DateTime, Duration, Utc};
use log::*;
use loyalty_common::Amount;
use serde_json::Value;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{MerchantId, PhoneHash, ShadowBalance},
    traits::LoyaltyStoreError,
};

pub async fn fetch_shadow_balance(id: i64, conn: &mut SqliteConnection) -> Result<Option<ShadowBalance>, LoyaltyStoreError> {
    let shadow = sqlx::query_as("SELECT * FROM shadow_balances WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(shadow)
}

pub async fn fetch_active_shadow_balance(
    merchant_id: &MerchantId,
    phone_hash: &PhoneHash,
    conn: &mut SqliteConnection,
) -> Result<Option<ShadowBalance>, LoyaltyStoreError> {
    let shadow = sqlx::query_as(
        "SELECT * FROM shadow_balances WHERE merchant_id = $1 AND phone_hash = $2 AND converted_at IS NULL",
    )
    .bind(merchant_id)
    .bind(phone_hash)
    .fetch_optional(conn)
    .await?;
    Ok(shadow)
}

/// Returns the active shadow balance for the merchant and phone hash, or creates a new one that expires at
/// `now + ttl`. An existing balance is returned as-is, even if it is already past its expiry.
pub async fn fetch_or_create_shadow_balance(
    merchant_id: &MerchantId,
    phone_hash: &PhoneHash,
    ttl: Duration,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<ShadowBalance, LoyaltyStoreError> {
    if let Some(shadow) = fetch_active_shadow_balance(merchant_id, phone_hash, &mut *conn).await? {
        return Ok(shadow);
    }
    let expires_at = now + ttl;
    let shadow: ShadowBalance = sqlx::query_as(
        r#"
    INSERT INTO shadow_balances (merchant_id, phone_hash, amount, state, expires_at, created_at, updated_at)
    VALUES ($1, $2, 0.0, '{}', $3, $4, $4)
    RETURNING *
    "#,
    )
    .bind(merchant_id)
    .bind(phone_hash)
    .bind(expires_at)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Shadow balance #{} created for merchant {merchant_id}. It expires at {expires_at}", shadow.id);
    Ok(shadow)
}

/// Updates an active shadow balance. If the balance was converted or expired in the meantime, nothing is written and
/// [`LoyaltyStoreError::ShadowBalanceNotActive`] is returned.
pub async fn update_shadow_balance(
    id: i64,
    amount: Amount,
    state: &Value,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<ShadowBalance, LoyaltyStoreError> {
    let shadow = sqlx::query_as(
        r#"
    UPDATE shadow_balances SET amount = $1, state = $2, updated_at = $3
    WHERE id = $4 AND converted_at IS NULL
    RETURNING *
    "#,
    )
    .bind(amount)
    .bind(Json(state))
    .bind(now)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    shadow.ok_or(LoyaltyStoreError::ShadowBalanceNotActive(id))
}

pub async fn fetch_active_shadow_balances_for_phone(
    phone_hash: &PhoneHash,
    conn: &mut SqliteConnection,
) -> Result<Vec<ShadowBalance>, LoyaltyStoreError> {
    let shadows = sqlx::query_as(
        "SELECT * FROM shadow_balances WHERE phone_hash = $1 AND converted_at IS NULL ORDER BY created_at, id",
    )
    .bind(phone_hash)
    .fetch_all(conn)
    .await?;
    Ok(shadows)
}

pub async fn fetch_expired_shadow_balances(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<ShadowBalance>, LoyaltyStoreError> {
    let shadows = sqlx::query_as(
        "SELECT * FROM shadow_balances WHERE converted_at IS NULL AND expires_at <= $1 ORDER BY expires_at, id",
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(shadows)
}

/// Moves a shadow balance into its terminal state. Only an active balance can be marked, so of two competing callers
/// exactly one succeeds; the other receives [`LoyaltyStoreError::ShadowBalanceNotActive`].
pub async fn mark_converted(
    id: i64,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<ShadowBalance, LoyaltyStoreError> {
    let shadow = sqlx::query_as(
        r#"
    UPDATE shadow_balances SET converted_at = $1, updated_at = $1
    WHERE id = $2 AND converted_at IS NULL
    RETURNING *
    "#,
    )
    .bind(at)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    shadow.ok_or(LoyaltyStoreError::ShadowBalanceNotActive(id))
}
