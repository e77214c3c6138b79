use std::time::Duration;

use chrono::Utc;
use log::*;
use loyalty_engine::{ExpirationApi, SqliteDatabase, SweepResult};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::MissedTickBehavior,
};

/// Shorter intervals are raised to this value.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Starts the shadow balance expiration worker.
///
/// The first sweep runs immediately, and then once every `interval`. The worker stops when `true` is sent on, or
/// the sender side of, the `shutdown` channel is dropped. A sweep that is in progress is always allowed to finish,
/// so awaiting the returned handle after signalling shutdown waits for any in-flight work.
///
/// An `interval` below [`MIN_SWEEP_INTERVAL`] is clamped to it.
pub fn start_expiry_worker(
    db: SqliteDatabase,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    if interval < MIN_SWEEP_INTERVAL {
        warn!("🕰️ A sweep interval of {interval:?} is too short. Sweeping every {MIN_SWEEP_INTERVAL:?} instead");
    }
    let interval = interval.max(MIN_SWEEP_INTERVAL);
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let api = ExpirationApi::new(db);
        info!("🕰️ Shadow balance expiration worker started. Sweeping every {}s", interval.as_secs());
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("🕰️ Expiration worker received the shutdown signal");
                        break;
                    }
                },
                _ = timer.tick() => run_sweep(&api).await,
            }
        }
        info!("🕰️ Expiration worker stopped");
    })
}

async fn run_sweep(api: &ExpirationApi<SqliteDatabase>) {
    info!("🕰️ Running shadow balance expiration job");
    match api.sweep(Utc::now()).await {
        Ok(result) => {
            info!("🕰️ {} of {} expired shadow balances forfeited", result.expired, result.found);
            if result.failed > 0 {
                warn!("🕰️ {} shadow balances could not be expired. They will be retried on the next sweep", result.failed);
            }
            debug!("🕰️ Breakage by merchant: {}", breakage_list(&result));
        },
        Err(e) => {
            error!("🕰️ Error running shadow balance expiration job: {e}");
        },
    }
}

fn breakage_list(result: &SweepResult) -> String {
    result
        .breakage_by_merchant
        .iter()
        .map(|(merchant, amount)| format!("[{merchant}] {amount}"))
        .collect::<Vec<String>>()
        .join(", ")
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, time::Duration};

    use chrono::{Duration as ChronoDuration, Utc};
    use loyalty_common::Amount;
    use loyalty_engine::{
        db_types::{CampaignType, MerchantId, NewCampaign},
        test_utils::prepare_env::{prepare_test_env, random_db_path},
        IngestRequest,
        IngestionApi,
        LoyaltyDatabase,
        SqliteDatabase,
        StrategyRegistry,
        UnregisteredIdentityResolver,
    };
    use serde_json::json;
    use tokio::sync::watch;

    use super::{start_expiry_worker, MIN_SWEEP_INTERVAL};

    async fn seed_stale_shadow(db: &SqliteDatabase) -> i64 {
        let merchant = MerchantId::from("coffee-corner");
        let config = json!({"required_punches": 5, "reward_amount": 10, "reward_type": "points"});
        db.insert_campaign(NewCampaign::new(merchant.clone(), "Coffee card", CampaignType::PunchCard, config))
            .await
            .expect("campaign should insert");
        let api = IngestionApi::new(
            db.clone(),
            UnregisteredIdentityResolver,
            Arc::new(StrategyRegistry::standard()),
            ChronoDuration::hours(1),
        );
        let two_hours_ago = Utc::now() - ChronoDuration::hours(2);
        let request = IngestRequest::new("+15550001111", "tx-1", Amount::from(12));
        api.process_transaction_at(&merchant, request, two_hours_ago).await.expect("purchase should be recorded");
        let entries = db.fetch_ledger_entries_for_merchant(&merchant).await.expect("ledger should load");
        entries[0].shadow_balance_id.expect("purchase should earn into a shadow balance")
    }

    #[tokio::test]
    async fn sweeps_at_startup() {
        let db = prepare_test_env(&random_db_path()).await;
        let shadow_id = seed_stale_shadow(&db).await;
        let (tx, rx) = watch::channel(false);
        let handle = start_expiry_worker(db.clone(), Duration::from_secs(3600), rx);
        let mut expired = false;
        for _ in 0..50 {
            let shadow = db.fetch_shadow_balance(shadow_id).await.unwrap().expect("shadow balance should exist");
            if shadow.converted_at.is_some() {
                expired = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(expired, "The stale shadow balance was not expired by the first sweep");
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle).await.expect("worker did not stop").unwrap();
    }

    #[tokio::test]
    async fn stops_on_shutdown() {
        let db = prepare_test_env(&random_db_path()).await;
        let (tx, rx) = watch::channel(false);
        let handle = start_expiry_worker(db, Duration::from_secs(3600), rx);
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle).await.expect("worker did not stop").unwrap();
    }

    #[tokio::test]
    async fn stops_when_sender_is_dropped() {
        let db = prepare_test_env(&random_db_path()).await;
        let (tx, rx) = watch::channel(false);
        let handle = start_expiry_worker(db, Duration::from_secs(3600), rx);
        drop(tx);
        tokio::time::timeout(Duration::from_secs(5), handle).await.expect("worker did not stop").unwrap();
    }

    #[tokio::test]
    async fn zero_interval_is_clamped() {
        assert!(MIN_SWEEP_INTERVAL > Duration::ZERO);
        let db = prepare_test_env(&random_db_path()).await;
        let shadow_id = seed_stale_shadow(&db).await;
        let (tx, rx) = watch::channel(false);
        let handle = start_expiry_worker(db.clone(), Duration::ZERO, rx);
        for _ in 0..50 {
            let shadow = db.fetch_shadow_balance(shadow_id).await.unwrap().expect("shadow balance should exist");
            if shadow.converted_at.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle).await.expect("worker did not stop").unwrap();
        let shadow = db.fetch_shadow_balance(shadow_id).await.unwrap().expect("shadow balance should exist");
        assert!(shadow.converted_at.is_some());
    }
}
