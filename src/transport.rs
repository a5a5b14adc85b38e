//! Broker-transport port.
//!
//! The seam between the pub/sub adapter and whatever actually moves bytes: an
//! AMQP client in production, the in-process transport from
//! [`memory`](crate::memory) in tests and single-node deployments. The
//! surface is deliberately AMQP-shaped — fanout exchanges, broker-named
//! queues, explicit per-delivery ack/nack — so the adapter's semantics do not
//! depend on which side of a socket the broker lives on.
//!
//! Implementations must tolerate concurrent calls on one channel; the adapter
//! additionally serialises its own use of the shared channel.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Transport-level failure.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection establishment failed.
    #[error("cannot reach broker at {url}: {reason}")]
    Connect { url: String, reason: String },

    /// The named queue does not exist on this channel.
    #[error("unknown queue `{0}`")]
    UnknownQueue(String),

    /// The queue already has a consumer (queues are exclusive).
    #[error("queue `{0}` already has a consumer")]
    QueueBusy(String),

    /// The delivery tag does not correspond to an outstanding delivery.
    #[error("unknown delivery tag {0}")]
    UnknownTag(u64),
}

/// One message handed to a consumer. The tag is the acknowledgment handle;
/// it is meaningful only to the channel that produced the delivery.
#[derive(Debug)]
pub struct Delivery {
    pub payload: Vec<u8>,
    pub tag: u64,
}

/// Connection factory. `url` is the broker connection string.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Channel>, TransportError>;
}

/// An open communication channel to the broker.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Declares a fanout exchange. Idempotent: declaring an existing exchange
    /// is a no-op.
    async fn declare_exchange(&self, name: &str) -> Result<(), TransportError>;

    /// Declares a broker-named queue and returns its name.
    async fn declare_queue(&self) -> Result<String, TransportError>;

    /// Binds `queue` to `exchange` so it receives every message published
    /// there (empty routing key — fanout ignores it).
    async fn bind_queue(&self, queue: &str, exchange: &str) -> Result<(), TransportError>;

    /// Publishes `payload` to every queue currently bound to `exchange`.
    async fn publish(&self, exchange: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Starts consuming `queue`, returning its delivery stream. Queues are
    /// exclusive: a second consume on the same queue fails.
    async fn consume(&self, queue: &str) -> Result<mpsc::UnboundedReceiver<Delivery>, TransportError>;

    /// Positive acknowledgment: the broker removes the delivery permanently.
    async fn ack(&self, queue: &str, tag: u64) -> Result<(), TransportError>;

    /// Negative acknowledgment. With `requeue` the broker redelivers the
    /// message; without it the message is dropped.
    async fn nack(&self, queue: &str, tag: u64, requeue: bool) -> Result<(), TransportError>;
}
