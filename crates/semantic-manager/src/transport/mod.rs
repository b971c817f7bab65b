//! The message transport the engine runs on.
//!
//! A [`Transport`] offers a topic exchange with durable queues bound to
//! routing-key patterns, private reply queues, acknowledged consumption and a
//! reply-to/correlation-id convention. Publishing to the empty exchange name
//! delivers straight to the queue named by the routing key.

pub mod memory;

pub use memory::InMemoryBroker;

use crate::error::TransportError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;

/// Exchange name that routes by queue name.
pub const DIRECT_EXCHANGE: &str = "";

/// A message as published.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub payload: Vec<u8>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
}

impl Message {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            ..Default::default()
        }
    }

    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, TransportError> {
        Ok(Self::new(serde_json::to_vec(value)?))
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_reply_to(mut self, queue: impl Into<String>) -> Self {
        self.reply_to = Some(queue.into());
        self
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// A message handed to a consumer. It stays unacknowledged until
/// [`Transport::ack`] is called with its tag.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub tag: u64,
    pub routing_key: String,
    pub message: Message,
}

pub type Consumer = mpsc::UnboundedReceiver<Delivery>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Declare a durable queue and bind it to `routing_keys` on `exchange`.
    /// Redeclaring adds bindings.
    async fn declare_queue(
        &self,
        exchange: &str,
        queue: &str,
        routing_keys: &[String],
    ) -> Result<(), TransportError>;

    /// Declare an exclusive, server-named queue for replies.
    async fn declare_reply_queue(&self) -> Result<String, TransportError>;

    /// Start consuming `queue`. A queue has at most one consumer.
    async fn consume(&self, queue: &str) -> Result<Consumer, TransportError>;

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: Message,
    ) -> Result<(), TransportError>;

    async fn ack(&self, tag: u64) -> Result<(), TransportError>;
}
