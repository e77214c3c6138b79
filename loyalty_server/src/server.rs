use std::{sync::Arc, time::Duration};

use log::*;
use loyalty_engine::{
    db_types::{CustomerId, MerchantId},
    helpers::hash_phone,
    ConversionApi,
    ConversionResult,
    IngestRequest,
    IngestResponse,
    IngestionApi,
    LoyaltyDatabase,
    LoyaltyError,
    SqliteDatabase,
    StatsApi,
    StrategyRegistry,
};
use tokio::sync::watch;

use crate::{config::ServerConfig, errors::ServerError, expiry_worker::start_expiry_worker, identity::ServerIdentity};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let mut db = SqliteDatabase::new_with_url(&config.database_url, config.max_db_connections)
        .await
        .map_err(|e| ServerError::InitializeError(format!("Could not open {}. {e}", config.database_url)))?;
    if config.auto_migrate {
        db.run_migrations().await?;
        info!("🚀️ Database migrations are up to date");
    }
    let services = LoyaltyServices::new(db.clone(), &config)?;
    info!(
        "🚀️ Loyalty services ready with {} reward strategies. Shadow balances expire after {} hours",
        services.strategy_count(),
        config.shadow_wallet_ttl.num_hours()
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = start_expiry_worker(db.clone(), config.expiration_interval, shutdown_rx);

    tokio::signal::ctrl_c().await?;
    info!("🚀️ Shutdown requested. Waiting for the expiration worker to finish");
    if shutdown_tx.send(true).is_err() {
        warn!("🚀️ The expiration worker had already stopped");
    }
    if let Err(e) = worker.await {
        error!("🚀️ The expiration worker did not shut down cleanly. {e}");
    }
    drop(services);
    db.close().await?;
    info!("🚀️ Database connections closed");
    Ok(())
}

/// The loyalty flows that the server hosts, wired up with the configured database, strategies and identity
/// resolver. Purchase and registration triggers are handed to these methods.
pub struct LoyaltyServices {
    ingestion: IngestionApi<SqliteDatabase, ServerIdentity>,
    conversion: ConversionApi<SqliteDatabase>,
    stats: StatsApi<SqliteDatabase>,
    strategies: Arc<StrategyRegistry>,
    request_timeout: Duration,
}

impl LoyaltyServices {
    pub fn new(db: SqliteDatabase, config: &ServerConfig) -> Result<Self, ServerError> {
        let strategies = Arc::new(StrategyRegistry::standard());
        let identity = ServerIdentity::from_config(&config.identity, config.request_timeout)?;
        let ingestion = IngestionApi::new(db.clone(), identity, Arc::clone(&strategies), config.shadow_wallet_ttl);
        let conversion = ConversionApi::new(db.clone());
        let stats = StatsApi::new(db);
        Ok(Self { ingestion, conversion, stats, strategies, request_timeout: config.request_timeout })
    }

    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }

    pub fn strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    pub fn stats(&self) -> &StatsApi<SqliteDatabase> {
        &self.stats
    }

    pub async fn on_purchase(
        &self,
        merchant_id: &MerchantId,
        request: IngestRequest,
    ) -> Result<IngestResponse, LoyaltyError> {
        self.ingestion.process_transaction_with_deadline(merchant_id, request, self.request_timeout).await
    }

    pub async fn on_customer_registered(
        &self,
        customer_id: &CustomerId,
        phone: &str,
    ) -> Result<ConversionResult, LoyaltyError> {
        self.conversion.convert_with_deadline(customer_id, &hash_phone(phone), self.request_timeout).await
    }
}
