use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{LedgerEntry, MerchantId, NewLedgerEntry},
    traits::LoyaltyStoreError,
};

/// Appends an entry to the ledger. There are no update or delete counterparts; the table rejects both.
pub async fn insert_entry(entry: NewLedgerEntry, conn: &mut SqliteConnection) -> Result<LedgerEntry, LoyaltyStoreError> {
    let entry = sqlx::query_as(
        r#"
    INSERT INTO transactions
        (merchant_id, campaign_id, wallet_id, shadow_balance_id, transaction_type, amount, metadata, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    RETURNING *
    "#,
    )
    .bind(entry.merchant_id)
    .bind(entry.campaign_id)
    .bind(entry.wallet_id)
    .bind(entry.shadow_balance_id)
    .bind(entry.transaction_type)
    .bind(entry.amount)
    .bind(Json(&entry.metadata))
    .bind(entry.created_at)
    .fetch_one(conn)
    .await?;
    Ok(entry)
}

pub async fn fetch_entries_for_merchant(
    merchant_id: &MerchantId,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerEntry>, LoyaltyStoreError> {
    let entries = sqlx::query_as("SELECT * FROM transactions WHERE merchant_id = $1 ORDER BY id")
        .bind(merchant_id)
        .fetch_all(conn)
        .await?;
    Ok(entries)
}
