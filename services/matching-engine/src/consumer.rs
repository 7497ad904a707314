//! Broker consumer
//!
//! Decodes each delivery and hands it to the engine task. Acknowledgement
//! policy:
//!
//! | outcome                         | action            |
//! |---------------------------------|-------------------|
//! | handled (including duplicates)  | ack               |
//! | malformed / validation failure  | ack, logged, dropped |
//! | transient I/O failure           | nack with requeue |
//!
//! Dropping poison messages keeps one bad event from looping forever.

use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use types::wire::OrderEvent;

use crate::broker::{Delivery, Subscription};
use crate::handle::EngineHandle;

/// Counters kept by a consumer run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub acked: u64,
    pub dropped: u64,
    pub requeued: u64,
}

pub struct EventConsumer<S> {
    subscription: S,
    engine: EngineHandle,
    shutdown: watch::Receiver<bool>,
    retry_backoff: Duration,
    stats: ConsumerStats,
}

impl<S: Subscription> EventConsumer<S> {
    pub fn new(subscription: S, engine: EngineHandle, shutdown: watch::Receiver<bool>, retry_backoff: Duration) -> Self {
        Self {
            subscription,
            engine,
            shutdown,
            retry_backoff,
            stats: ConsumerStats::default(),
        }
    }

    /// Consume until shutdown is signalled or the queue goes away
    ///
    /// A delivery already taken is always settled before the loop checks
    /// for shutdown again.
    pub async fn run(mut self) -> ConsumerStats {
        info!("Consumer started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            let delivery = tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                delivery = self.subscription.next() => delivery,
            };
            let Some(delivery) = delivery else {
                warn!("Subscription closed");
                break;
            };
            self.process(delivery).await;
        }
        info!(
            acked = self.stats.acked,
            dropped = self.stats.dropped,
            requeued = self.stats.requeued,
            "Consumer stopped"
        );
        self.stats
    }

    async fn process(&mut self, delivery: Delivery) {
        let event = match OrderEvent::decode(&delivery.payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, redelivered = delivery.redelivered, "Malformed event dropped");
                self.settle(delivery, Settle::Drop).await;
                return;
            }
        };
        let order_id = event.order_id().clone();
        let cmd = event.cmd();

        match self.engine.dispatch(event).await {
            Ok(outcome) => {
                debug!(order_id = %order_id, cmd = %cmd, outcome = ?outcome, "Event handled");
                self.settle(delivery, Settle::Ack).await;
            }
            Err(e) if e.is_retryable() => {
                warn!(order_id = %order_id, cmd = %cmd, error = %e, "Event failed, requeueing");
                tokio::time::sleep(self.retry_backoff).await;
                self.settle(delivery, Settle::Requeue).await;
            }
            Err(e) => {
                warn!(order_id = %order_id, cmd = %cmd, error = %e, "Event rejected, dropped");
                self.settle(delivery, Settle::Drop).await;
            }
        }
    }

    async fn settle(&mut self, delivery: Delivery, how: Settle) {
        let result = match how {
            Settle::Ack => {
                self.stats.acked += 1;
                delivery.ack().await
            }
            Settle::Drop => {
                self.stats.dropped += 1;
                delivery.ack().await
            }
            Settle::Requeue => {
                self.stats.requeued += 1;
                delivery.nack(true).await
            }
        };
        if let Err(e) = result {
            error!(error = %e, "Failed to settle delivery");
        }
    }
}

enum Settle {
    Ack,
    Drop,
    Requeue,
}
