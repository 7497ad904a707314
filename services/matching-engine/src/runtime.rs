//! Engine runtime
//!
//! Starts the three long-lived tasks of the matching process (engine actor,
//! broker consumer, sweep timer) and stops them in order on shutdown: the
//! consumer stops taking deliveries and the timer stops first, then the
//! engine finishes whatever commands are already queued.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::broker::Subscription;
use crate::consumer::{ConsumerStats, EventConsumer};
use crate::engine::MatchingEngine;
use crate::handle::EngineHandle;

pub struct EngineRuntime {
    handle: EngineHandle,
    shutdown: watch::Sender<bool>,
    engine_task: JoinHandle<MatchingEngine>,
    consumer_task: JoinHandle<ConsumerStats>,
    ticker_task: JoinHandle<()>,
}

impl EngineRuntime {
    /// Spawn the engine, a consumer on `subscription` and the sweep timer
    pub fn start<S>(engine: MatchingEngine, subscription: S) -> Self
    where
        S: Subscription + 'static,
    {
        let config = engine.config().clone();
        let (handle, engine_task) = EngineHandle::spawn(engine, config.command_buffer);
        let (shutdown, stop_rx) = watch::channel(false);

        let consumer = EventConsumer::new(subscription, handle.clone(), stop_rx.clone(), config.retry_backoff);
        let consumer_task = tokio::spawn(consumer.run());
        let ticker_task = tokio::spawn(sweep_ticker(handle.clone(), config.sweep_interval, stop_rx));

        info!(
            sweep_interval_ms = config.sweep_interval.as_millis() as u64,
            eager_sweep = config.eager_sweep,
            "Engine runtime started"
        );
        Self {
            handle,
            shutdown,
            engine_task,
            consumer_task,
            ticker_task,
        }
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Stop consuming, stop the timer, drain the engine
    ///
    /// Returns the engine so callers can inspect its final state.
    pub async fn shutdown(self) -> Option<MatchingEngine> {
        let _ = self.shutdown.send(true);

        match self.consumer_task.await {
            Ok(stats) => info!(acked = stats.acked, dropped = stats.dropped, requeued = stats.requeued, "Consumer drained"),
            Err(e) => warn!(error = %e, "Consumer task failed"),
        }
        if let Err(e) = self.ticker_task.await {
            warn!(error = %e, "Sweep timer task failed");
        }
        if let Err(e) = self.handle.shutdown().await {
            warn!(error = %e, "Engine already stopped");
        }
        match self.engine_task.await {
            Ok(engine) => {
                info!("Engine runtime stopped");
                Some(engine)
            }
            Err(e) => {
                warn!(error = %e, "Engine task failed");
                None
            }
        }
    }
}

async fn sweep_ticker(handle: EngineHandle, period: std::time::Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the first sweep waits a period.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                match handle.sweep().await {
                    Ok(_) => {}
                    Err(e) if e == crate::errors::EngineError::Stopped => break,
                    Err(e) => warn!(error = %e, "Scheduled sweep failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{EventPublisher, MemoryBroker};
    use crate::config::EngineConfig;
    use crate::store::{LedgerStore, MemoryBalanceCache, MemoryLedger, MemoryPriceCache};
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use std::time::Duration;
    use types::account::Wallet;
    use types::ids::{ProductName, UserId};
    use types::market::Product;
    use types::numeric::{Price, Quantity};
    use types::order::{Order, OrderStatus, PriceMode, Side};
    use types::wire::OrderEvent;

    fn order(owner: i64, side: Side, mode: PriceMode, limit: u64, seq: u64) -> Order {
        Order::new(
            UserId::new(owner),
            side,
            mode,
            ProductName::new("Widget"),
            "USD",
            Quantity::try_new(5).unwrap(),
            Price::from_u64(limit),
            seq,
            0,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_sweeps_and_shutdown_drains() {
        let ledger = Arc::new(MemoryLedger::new());
        for user in [1, 2] {
            ledger.open_wallet(&Wallet::new(UserId::new(user), "USD", Decimal::from(100))).await.unwrap();
        }
        ledger
            .list_product(&Product::new(ProductName::new("Widget"), 100, "USD", Price::from_u64(10), 0))
            .await
            .unwrap();
        let config = EngineConfig {
            sweep_interval: Duration::from_secs(30),
            ..EngineConfig::default()
        };
        let engine = MatchingEngine::new(
            config,
            ledger.clone(),
            Arc::new(MemoryBalanceCache::new()),
            Arc::new(MemoryPriceCache::new()),
        );
        let broker = MemoryBroker::new("orders");
        broker.declare_queue("engine", "order.events");
        let runtime = EngineRuntime::start(engine, broker.subscribe("engine").unwrap());

        let buy = order(1, Side::Buy, PriceMode::Market, 0, 1);
        let sell = order(2, Side::Sell, PriceMode::Limit, 8, 2);
        for o in [&buy, &sell] {
            ledger.insert_order(o).await.unwrap();
            broker.publish("order.events", OrderEvent::Submit(o.clone()).encode().unwrap()).await.unwrap();
        }

        // Both enqueued, no sweep yet.
        let handle = runtime.handle();
        let mut snapshot = handle.snapshot().await.unwrap();
        while snapshot.buys.len() + snapshot.sells.len() < 2 {
            tokio::task::yield_now().await;
            snapshot = handle.snapshot().await.unwrap();
        }
        assert!(ledger.order(&buy.order_id).await.unwrap().unwrap().is_waiting());

        tokio::time::sleep(Duration::from_secs(31)).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.buys.is_empty() && snapshot.sells.is_empty());
        assert_eq!(
            ledger.order(&buy.order_id).await.unwrap().unwrap().status,
            OrderStatus::Finished
        );

        let engine = runtime.shutdown().await.unwrap();
        assert!(engine.book().is_empty());
    }
}
