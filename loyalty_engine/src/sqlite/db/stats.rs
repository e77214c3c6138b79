use chrono::{DateTime, Utc};
use loyalty_common::Amount;
use sqlx::{Row, SqliteConnection};

use crate::{
    db_types::MerchantId,
    traits::{ConversionStats, ExpirationMetrics, LoyaltyStoreError},
};

/// Conversion and expiry counts come from the ledger, so they reflect what actually happened to each balance rather
/// than inferring it from timestamps.
pub async fn conversion_stats(
    merchant_id: &MerchantId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<ConversionStats, LoyaltyStoreError> {
    let row = sqlx::query(
        r#"
    SELECT
        (SELECT COUNT(*) FROM shadow_balances WHERE merchant_id = $1) AS total_shadow_balances,
        (SELECT COUNT(*) FROM shadow_balances WHERE merchant_id = $1 AND converted_at IS NULL AND expires_at > $2)
            AS active_count,
        COUNT(CASE WHEN transaction_type = 'CONVERT' THEN 1 END) AS converted_count,
        COUNT(CASE WHEN transaction_type = 'EXPIRE' THEN 1 END) AS expired_count,
        TOTAL(CASE WHEN transaction_type = 'CONVERT' THEN amount END) AS total_converted_amount,
        TOTAL(CASE WHEN transaction_type = 'EXPIRE' THEN -amount END) AS total_breakage
    FROM transactions
    WHERE merchant_id = $1
    "#,
    )
    .bind(merchant_id)
    .bind(now)
    .fetch_one(conn)
    .await?;
    let stats = ConversionStats {
        merchant_id: merchant_id.clone(),
        total_shadow_balances: row.try_get("total_shadow_balances")?,
        converted_count: row.try_get("converted_count")?,
        expired_count: row.try_get("expired_count")?,
        active_count: row.try_get("active_count")?,
        total_converted_amount: row.try_get("total_converted_amount")?,
        total_breakage: row.try_get("total_breakage")?,
        conversion_rate: 0.0,
    };
    Ok(stats.with_rate())
}

pub async fn expiration_metrics(conn: &mut SqliteConnection) -> Result<ExpirationMetrics, LoyaltyStoreError> {
    let row = sqlx::query(
        r#"
    SELECT COUNT(*) AS total_expired, TOTAL(-amount) AS total_breakage
    FROM transactions
    WHERE transaction_type = 'EXPIRE'
    "#,
    )
    .fetch_one(conn)
    .await?;
    let total_expired: i64 = row.try_get("total_expired")?;
    let total_breakage: Amount = row.try_get("total_breakage")?;
    let average_breakage =
        if total_expired > 0 { total_breakage * (1.0 / total_expired as f64) } else { Amount::zero() };
    Ok(ExpirationMetrics { total_expired, total_breakage, average_breakage })
}
