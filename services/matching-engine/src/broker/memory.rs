//! In-process direct exchange
//!
//! Queues are unbounded channels bound to routing keys. Each queue has at
//! most one consumer. Rejected-with-requeue and dropped deliveries are sent
//! back to the tail of their queue marked as redelivered.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{Acker, Delivery, EventPublisher, Subscription};
use crate::errors::BrokerError;

#[derive(Debug, Clone)]
struct Message {
    payload: Vec<u8>,
    redelivered: bool,
}

/// Single direct exchange held in memory
#[derive(Debug)]
pub struct MemoryBroker {
    exchange: String,
    bindings: DashMap<String, Vec<String>>,
    queues: DashMap<String, mpsc::UnboundedSender<Message>>,
    unconsumed: DashMap<String, mpsc::UnboundedReceiver<Message>>,
    closed: AtomicBool,
}

impl MemoryBroker {
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            bindings: DashMap::new(),
            queues: DashMap::new(),
            unconsumed: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Declare `queue` (if new) and bind it to `routing_key`
    pub fn declare_queue(&self, queue: &str, routing_key: &str) {
        if !self.queues.contains_key(queue) {
            let (tx, rx) = mpsc::unbounded_channel();
            self.queues.insert(queue.to_string(), tx);
            self.unconsumed.insert(queue.to_string(), rx);
        }
        let mut bound = self.bindings.entry(routing_key.to_string()).or_default();
        if !bound.iter().any(|q| q == queue) {
            bound.push(queue.to_string());
        }
        debug!(exchange = %self.exchange, queue, routing_key, "Queue bound");
    }

    /// Become the consumer of `queue`
    pub fn subscribe(&self, queue: &str) -> Result<MemorySubscription, BrokerError> {
        let requeue = self
            .queues
            .get(queue)
            .map(|tx| tx.clone())
            .ok_or_else(|| BrokerError::UnknownQueue(queue.to_string()))?;
        let (_, rx) = self
            .unconsumed
            .remove(queue)
            .ok_or_else(|| BrokerError::AlreadyConsumed(queue.to_string()))?;
        Ok(MemorySubscription { rx, requeue })
    }

    /// Simulate losing (or regaining) the broker connection
    pub fn set_closed(&self, closed: bool) {
        self.closed.store(closed, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventPublisher for MemoryBroker {
    async fn publish(&self, routing_key: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }
        let queues = self
            .bindings
            .get(routing_key)
            .map(|b| b.clone())
            .filter(|b| !b.is_empty())
            .ok_or_else(|| BrokerError::Unroutable(routing_key.to_string()))?;

        for queue in queues {
            let Some(tx) = self.queues.get(&queue).map(|tx| tx.clone()) else {
                continue;
            };
            tx.send(Message {
                payload: payload.clone(),
                redelivered: false,
            })
            .map_err(|_| BrokerError::Closed)?;
        }
        Ok(())
    }
}

/// Consumer side of one queue
pub struct MemorySubscription {
    rx: mpsc::UnboundedReceiver<Message>,
    requeue: mpsc::UnboundedSender<Message>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next(&mut self) -> Option<Delivery> {
        let message = self.rx.recv().await?;
        let acker = MemoryAcker {
            message: Some(message.clone()),
            requeue: self.requeue.clone(),
        };
        Some(Delivery::new(message.payload, message.redelivered, Box::new(acker)))
    }
}

struct MemoryAcker {
    /// Present until the delivery is settled
    message: Option<Message>,
    requeue: mpsc::UnboundedSender<Message>,
}

impl MemoryAcker {
    fn send_back(&mut self) -> Result<(), BrokerError> {
        match self.message.take() {
            Some(mut message) => {
                message.redelivered = true;
                self.requeue.send(message).map_err(|_| BrokerError::Closed)
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Acker for MemoryAcker {
    async fn ack(self: Box<Self>) -> Result<(), BrokerError> {
        let mut settled = self;
        settled.message = None;
        Ok(())
    }

    async fn nack(self: Box<Self>, requeue: bool) -> Result<(), BrokerError> {
        let mut settled = self;
        if requeue {
            settled.send_back()
        } else {
            settled.message = None;
            Ok(())
        }
    }
}

impl Drop for MemoryAcker {
    fn drop(&mut self) {
        if self.message.is_some() {
            warn!("Unsettled delivery dropped, requeueing");
            let _ = self.send_back();
        }
    }
}
