//! Message-broker contract.
//!
//! A topic is a named fanout channel: every active subscription receives a
//! copy of each published message, independent of the others. Delivery is
//! **at-least-once** — a handler may see the same message more than once
//! (redelivery after a failure, broker retries) and must be idempotent. The
//! broker never deduplicates.
//!
//! Publishers and subscribers exchange plain [`serde_json::Value`] payloads;
//! use-case-specific DTOs are decoded inside the handler, the same way HTTP
//! bodies are. Delivery metadata (tags, acknowledgment handles) belongs to the
//! adapter and never appears on this surface.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::transport::TransportError;

/// Failure of a publish or subscribe call, surfaced to the caller. The
/// contract makes no retry guarantee — retrying is the caller's decision.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The underlying transport cannot be reached or has gone away.
    #[error("broker unavailable: {0}")]
    Unavailable(#[source] TransportError),
}

/// Publish/subscribe capability, independent of transport.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Serialises `message` and sends it to `topic`, declaring the topic's
    /// fanout channel first (an idempotent operation).
    async fn publish(&self, topic: &str, message: Value) -> Result<(), BrokerError>;

    /// Binds `subscriber` to `topic` through its own queue and starts
    /// delivering. Returns once the subscription is registered — it does not
    /// block for the subscription's lifetime, which is the lifetime of the
    /// process.
    async fn subscribe(&self, topic: &str, subscriber: Arc<dyn Subscriber>) -> Result<(), BrokerError>;
}

/// A message handler bound to a topic.
///
/// Returning `Ok` acknowledges the message; returning `Err` negatively
/// acknowledges it and the broker redelivers. There is no retry cutoff, so a
/// handler that can never succeed on some payload causes unbounded
/// redelivery — park such payloads yourself if that matters.
///
/// Blanket-implemented for async closures `Fn(Value) -> anyhow::Result<()>`.
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn on_message(&self, payload: Value) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> Subscriber for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn on_message(&self, payload: Value) -> anyhow::Result<()> {
        (self)(payload).await
    }
}
