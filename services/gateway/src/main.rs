mod auth;
mod error;
mod handlers;
mod intake;
mod models;
mod rate_limit;
mod router;
mod seed;
mod settings;
mod state;
mod telemetry;

use anyhow::Context;
use intake::OrderIntake;
use matching_engine::broker::memory::MemoryBroker;
use matching_engine::prices::MarketPrices;
use matching_engine::store::LedgerStore;
use matching_engine::store::memory::{MemoryBalanceCache, MemoryPriceCache};
use matching_engine::{EngineRuntime, MatchingEngine};
use persistence::JournaledLedger;
use risk_engine::RiskEngine;
use router::create_router;
use settings::Settings;
use state::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let settings = Settings::load().context("loading configuration")?;
    telemetry::init(&settings.log.filter);

    tracing::info!("Starting marketplace gateway");

    let engine_config = settings.engine.engine_config()?;
    let journal_config = settings.ledger.journal_config()?;
    let rates = settings.rate_table()?;

    // Durable ledger, rebuilt from the journal
    let (journal, recovered) = JournaledLedger::open(journal_config).context("recovering ledger")?;
    if let Some(tail) = &recovered.torn_tail {
        tracing::warn!(file = %tail.file.display(), discarded = tail.discarded, "Recovered past a torn journal tail");
    }
    let journal = Arc::new(journal);
    let ledger: Arc<dyn LedgerStore> = journal.clone();
    seed::apply(&settings.seed, ledger.as_ref()).await.context("applying seed")?;

    let balances = Arc::new(MemoryBalanceCache::new());
    let price_cache = Arc::new(MemoryPriceCache::new());

    let broker = Arc::new(MemoryBroker::new(settings.broker.exchange.clone()));
    broker.declare_queue(&settings.broker.queue, &settings.broker.routing_key);
    let subscription = broker.subscribe(&settings.broker.queue)?;

    // Engine: book rebuilt from every pending order, then started
    let mut engine = MatchingEngine::new(engine_config.clone(), ledger.clone(), balances.clone(), price_cache.clone());
    let restored = engine.restore().await.context("restoring order book")?;
    tracing::info!(restored, "Order book restored");
    let runtime = EngineRuntime::start(engine, subscription);

    let prices = MarketPrices::new(price_cache, ledger.clone(), engine_config.io_timeout);
    let intake = OrderIntake::new(
        ledger,
        balances,
        prices.clone(),
        broker,
        RiskEngine::new(rates),
        settings.broker.routing_key.clone(),
        engine_config.io_timeout,
    )
    .await?;
    intake.restore_balances().await?;

    let app = create_router(AppState::new(intake, prices));

    let listener = TcpListener::bind(&settings.http.bind)
        .await
        .with_context(|| format!("binding {}", settings.http.bind))?;
    tracing::info!("Listening on {}", settings.http.bind);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, draining engine");
    runtime.shutdown().await;
    journal.sync().await?;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
