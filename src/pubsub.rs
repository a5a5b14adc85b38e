//! Durable pub/sub adapter: the concrete [`MessageBroker`].
//!
//! One adapter instance owns one logical broker connection, established
//! lazily on the first `publish` or `subscribe` and reused by every later
//! call — the channel is a shared singleton, not one per call. A failed
//! connection attempt surfaces as [`BrokerError::Unavailable`] and leaves the
//! adapter disconnected; there is no background reconnect loop, but the next
//! call simply tries again.
//!
//! Every subscription gets its own queue bound to the topic's fanout
//! exchange, driven by a long-lived task that pulls deliveries one at a time:
//! parse, invoke the handler, then acknowledge on success or
//! negative-acknowledge with requeue on failure. A payload that does not
//! parse counts as a handler failure and requeues too. Handler failures never
//! escape the loop — they manifest only as redelivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::broker::{BrokerError, MessageBroker, Subscriber};
use crate::transport::{Channel, Transport, TransportError};

/// Pause after a negative acknowledgment, so a message whose handler keeps
/// failing redelivers at a walkable pace instead of spinning the loop hot.
const REDELIVERY_PAUSE: Duration = Duration::from_millis(25);

/// Connection state of one adapter: `Down` before the first connect, and
/// again whenever a channel operation fails with a connection error.
enum Link {
    Down,
    Up(Arc<dyn Channel>),
}

/// Surfaces a failed channel operation as [`BrokerError::Unavailable`]. A
/// connection-class failure also drops the link, so the next call reconnects
/// instead of reusing a dead channel.
fn channel_failed(link: &mut Link, e: TransportError) -> BrokerError {
    if matches!(e, TransportError::Connect { .. }) {
        *link = Link::Down;
    }
    BrokerError::Unavailable(e)
}

/// Fanout broker over a [`Transport`], with per-message ack/requeue.
pub struct DurablePubSub {
    url: String,
    transport: Arc<dyn Transport>,
    /// Guards both the connection state transition and all use of the shared
    /// channel, so concurrent publishes cannot interleave on it. Handler
    /// invocation never happens under this lock.
    link: Arc<Mutex<Link>>,
}

impl DurablePubSub {
    pub fn new(url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            url: url.into(),
            transport,
            link: Arc::new(Mutex::new(Link::Down)),
        }
    }

    /// Returns the shared channel, connecting first if the link is down.
    /// On connection failure the link stays down for the next attempt.
    async fn channel(&self, link: &mut Link) -> Result<Arc<dyn Channel>, BrokerError> {
        if let Link::Up(channel) = link {
            return Ok(Arc::clone(channel));
        }
        match self.transport.connect(&self.url).await {
            Ok(channel) => {
                let channel: Arc<dyn Channel> = Arc::from(channel);
                debug!(url = %self.url, "broker connection established");
                *link = Link::Up(Arc::clone(&channel));
                Ok(channel)
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "broker connection failed");
                Err(BrokerError::Unavailable(e))
            }
        }
    }
}

#[async_trait]
impl MessageBroker for DurablePubSub {
    async fn publish(&self, topic: &str, message: Value) -> Result<(), BrokerError> {
        let payload = serde_json::to_vec(&message).unwrap_or_else(|_| b"null".to_vec());

        let mut link = self.link.lock().await;
        let channel = self.channel(&mut link).await?;
        channel
            .declare_exchange(topic)
            .await
            .map_err(|e| channel_failed(&mut link, e))?;
        channel
            .publish(topic, payload)
            .await
            .map_err(|e| channel_failed(&mut link, e))?;
        debug!(topic, "message published");
        Ok(())
    }

    async fn subscribe(&self, topic: &str, subscriber: Arc<dyn Subscriber>) -> Result<(), BrokerError> {
        // Queue setup happens under the link lock like any other channel use;
        // the delivery loop below takes the lock per settlement only.
        let (queue, mut receiver) = {
            let mut link = self.link.lock().await;
            let channel = self.channel(&mut link).await?;
            channel
                .declare_exchange(topic)
                .await
                .map_err(|e| channel_failed(&mut link, e))?;
            let queue = channel
                .declare_queue()
                .await
                .map_err(|e| channel_failed(&mut link, e))?;
            channel
                .bind_queue(&queue, topic)
                .await
                .map_err(|e| channel_failed(&mut link, e))?;
            let receiver = channel
                .consume(&queue)
                .await
                .map_err(|e| channel_failed(&mut link, e))?;
            (queue, receiver)
        };

        let link = Arc::clone(&self.link);
        let topic = topic.to_owned();

        tokio::spawn(async move {
            debug!(%topic, %queue, "subscription active");
            while let Some(delivery) = receiver.recv().await {
                // The handler runs outside the link lock: a slow or hung
                // handler stalls only this queue, never publishes or other
                // subscriptions.
                let outcome = match serde_json::from_slice::<Value>(&delivery.payload) {
                    Ok(payload) => subscriber.on_message(payload).await,
                    Err(e) => Err(anyhow::Error::from(e).context("malformed payload")),
                };
                let failed = outcome.is_err();

                {
                    let mut link = link.lock().await;
                    let channel = match &*link {
                        Link::Up(channel) => Arc::clone(channel),
                        Link::Down => {
                            warn!(%topic, %queue, "link down, cannot settle delivery");
                            continue;
                        }
                    };
                    let settled = match outcome {
                        Ok(()) => channel.ack(&queue, delivery.tag).await,
                        Err(e) => {
                            warn!(%topic, %queue, error = %e, "handler failed, requeueing message");
                            channel.nack(&queue, delivery.tag, true).await
                        }
                    };
                    if let Err(e) = settled {
                        let e = channel_failed(&mut link, e);
                        warn!(%topic, %queue, error = %e, "settlement failed");
                    }
                }

                if failed {
                    tokio::time::sleep(REDELIVERY_PAUSE).await;
                }
            }
            debug!(%topic, %queue, "delivery stream closed, subscription over");
        });

        Ok(())
    }
}
