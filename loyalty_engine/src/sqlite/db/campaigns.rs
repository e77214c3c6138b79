use chrono::{DateTime, Utc};
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{Campaign, MerchantId, NewCampaign},
    traits::LoyaltyStoreError,
};

pub async fn insert_campaign(
    campaign: NewCampaign,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Campaign, LoyaltyStoreError> {
    let campaign = sqlx::query_as(
        r#"
    INSERT INTO campaigns (merchant_id, name, campaign_type, config, is_active, starts_at, ends_at, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
    RETURNING *
    "#,
    )
    .bind(campaign.merchant_id)
    .bind(campaign.name)
    .bind(campaign.campaign_type)
    .bind(Json(&campaign.config))
    .bind(campaign.is_active)
    .bind(campaign.starts_at)
    .bind(campaign.ends_at)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| LoyaltyStoreError::CampaignInsertError(e.to_string()))?;
    Ok(campaign)
}

/// Fetches the merchant's running campaign. Ties are broken by creation date, newest first.
pub async fn fetch_active_campaign(
    merchant_id: &MerchantId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Campaign>, LoyaltyStoreError> {
    let campaign = sqlx::query_as(
        r#"
    SELECT * FROM campaigns
    WHERE merchant_id = $1
      AND is_active = 1
      AND (starts_at IS NULL OR starts_at <= $2)
      AND (ends_at IS NULL OR ends_at >= $2)
    ORDER BY created_at DESC, id DESC
    LIMIT 1
    "#,
    )
    .bind(merchant_id)
    .bind(now)
    .fetch_optional(conn)
    .await?;
    Ok(campaign)
}
