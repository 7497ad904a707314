//! Message broker ports
//!
//! One direct exchange, one routing key, at-least-once delivery. A delivery
//! must be acknowledged or rejected; one that is dropped unsettled goes back
//! to the queue, like an unacked message on a closed channel.

pub mod memory;

use async_trait::async_trait;

use crate::errors::BrokerError;

pub use memory::{MemoryBroker, MemorySubscription};

/// Publishes encoded events to the exchange
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, routing_key: &str, payload: Vec<u8>) -> Result<(), BrokerError>;
}

/// Settles one delivery with the broker
#[async_trait]
pub trait Acker: Send {
    async fn ack(self: Box<Self>) -> Result<(), BrokerError>;

    async fn nack(self: Box<Self>, requeue: bool) -> Result<(), BrokerError>;
}

/// A message handed to a consumer
pub struct Delivery {
    pub payload: Vec<u8>,
    /// Set when the broker has delivered this message before
    pub redelivered: bool,
    acker: Box<dyn Acker>,
}

impl Delivery {
    pub fn new(payload: Vec<u8>, redelivered: bool, acker: Box<dyn Acker>) -> Self {
        Self {
            payload,
            redelivered,
            acker,
        }
    }

    pub async fn ack(self) -> Result<(), BrokerError> {
        self.acker.ack().await
    }

    /// Reject, optionally returning the message to the queue
    pub async fn nack(self, requeue: bool) -> Result<(), BrokerError> {
        self.acker.nack(requeue).await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("bytes", &self.payload.len())
            .field("redelivered", &self.redelivered)
            .finish()
    }
}

/// Stream of deliveries from one queue
#[async_trait]
pub trait Subscription: Send {
    /// Next delivery, `None` once the queue is gone
    async fn next(&mut self) -> Option<Delivery>;
}
