//! In-process broker transport.
//!
//! A complete [`Transport`] implementation with no IO: exchanges fan out to
//! bound queues, queues hold deliveries until they are acknowledged, and a
//! negative acknowledgment with requeue puts the payload back in flight under
//! a fresh tag. Every channel opened from one `MemoryTransport` shares the
//! same broker state, so independently-connected components see each other's
//! topics — the transport *is* the broker, living in this process.
//!
//! Queues here are exclusive per-process fanout listeners: they live exactly
//! as long as the broker state does and are not reclaimed across restarts.
//! Single-node deployments and tests run on this transport directly; a wire
//! transport (AMQP or similar) slots in behind the same trait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::transport::{Channel, Delivery, Transport, TransportError};

#[derive(Default)]
struct BrokerState {
    /// Exchange name → queues bound to it.
    exchanges: Mutex<HashMap<String, Vec<String>>>,
    queues: Mutex<HashMap<String, Queue>>,
    next_queue: AtomicU64,
    next_tag: AtomicU64,
}

struct Queue {
    sender: mpsc::UnboundedSender<Delivery>,
    /// Taken by the first (and only) consumer.
    receiver: Option<mpsc::UnboundedReceiver<Delivery>>,
    /// Deliveries handed out but not yet settled, keyed by tag.
    unacked: HashMap<u64, Vec<u8>>,
}

/// An in-process fanout broker exposed through the [`Transport`] port.
#[derive(Default)]
pub struct MemoryTransport {
    state: Arc<BrokerState>,
    unreachable: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent [`connect`](Transport::connect) calls fail (or
    /// succeed again), for exercising unavailability paths.
    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn Channel>, TransportError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(TransportError::Connect {
                url: url.to_owned(),
                reason: "broker not reachable".to_owned(),
            });
        }
        Ok(Box::new(MemoryChannel { state: Arc::clone(&self.state) }))
    }
}

struct MemoryChannel {
    state: Arc<BrokerState>,
}

impl MemoryChannel {
    /// A poisoned lock only means some other thread panicked mid-operation;
    /// the maps themselves are still coherent, so take them as-is.
    fn exchanges(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<String>>> {
        self.state.exchanges.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn queues(&self) -> std::sync::MutexGuard<'_, HashMap<String, Queue>> {
        self.state.queues.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn declare_exchange(&self, name: &str) -> Result<(), TransportError> {
        self.exchanges().entry(name.to_owned()).or_default();
        Ok(())
    }

    async fn declare_queue(&self) -> Result<String, TransportError> {
        let name = format!("q-{}", self.state.next_queue.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = mpsc::unbounded_channel();
        self.queues().insert(
            name.clone(),
            Queue { sender, receiver: Some(receiver), unacked: HashMap::new() },
        );
        Ok(name)
    }

    async fn bind_queue(&self, queue: &str, exchange: &str) -> Result<(), TransportError> {
        if !self.queues().contains_key(queue) {
            return Err(TransportError::UnknownQueue(queue.to_owned()));
        }
        let mut exchanges = self.exchanges();
        let bound = exchanges.entry(exchange.to_owned()).or_default();
        if !bound.iter().any(|q| q == queue) {
            bound.push(queue.to_owned());
        }
        Ok(())
    }

    async fn publish(&self, exchange: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let bound = self.exchanges().get(exchange).cloned().unwrap_or_default();
        let mut queues = self.queues();
        for name in bound {
            let Some(queue) = queues.get_mut(&name) else { continue };
            let tag = self.state.next_tag.fetch_add(1, Ordering::SeqCst);
            queue.unacked.insert(tag, payload.clone());
            // A failed send means the consumer side is gone; the message
            // stays in `unacked` until the queue itself is dropped.
            let _ = queue.sender.send(Delivery { payload: payload.clone(), tag });
        }
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<mpsc::UnboundedReceiver<Delivery>, TransportError> {
        let mut queues = self.queues();
        let entry = queues
            .get_mut(queue)
            .ok_or_else(|| TransportError::UnknownQueue(queue.to_owned()))?;
        entry
            .receiver
            .take()
            .ok_or_else(|| TransportError::QueueBusy(queue.to_owned()))
    }

    async fn ack(&self, queue: &str, tag: u64) -> Result<(), TransportError> {
        let mut queues = self.queues();
        let entry = queues
            .get_mut(queue)
            .ok_or_else(|| TransportError::UnknownQueue(queue.to_owned()))?;
        entry
            .unacked
            .remove(&tag)
            .map(|_| ())
            .ok_or(TransportError::UnknownTag(tag))
    }

    async fn nack(&self, queue: &str, tag: u64, requeue: bool) -> Result<(), TransportError> {
        let mut queues = self.queues();
        let entry = queues
            .get_mut(queue)
            .ok_or_else(|| TransportError::UnknownQueue(queue.to_owned()))?;
        let payload = entry
            .unacked
            .remove(&tag)
            .ok_or(TransportError::UnknownTag(tag))?;
        if requeue {
            let fresh = self.state.next_tag.fetch_add(1, Ordering::SeqCst);
            entry.unacked.insert(fresh, payload.clone());
            let _ = entry.sender.send(Delivery { payload, tag: fresh });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn channel() -> Box<dyn Channel> {
        MemoryTransport::new().connect("mem://local").await.unwrap()
    }

    #[tokio::test]
    async fn publish_fans_out_to_every_bound_queue() {
        let ch = channel().await;
        ch.declare_exchange("orders").await.unwrap();

        let a = ch.declare_queue().await.unwrap();
        let b = ch.declare_queue().await.unwrap();
        ch.bind_queue(&a, "orders").await.unwrap();
        ch.bind_queue(&b, "orders").await.unwrap();

        ch.publish("orders", b"m1".to_vec()).await.unwrap();

        let mut rx_a = ch.consume(&a).await.unwrap();
        let mut rx_b = ch.consume(&b).await.unwrap();
        assert_eq!(rx_a.recv().await.unwrap().payload, b"m1".to_vec());
        assert_eq!(rx_b.recv().await.unwrap().payload, b"m1".to_vec());
    }

    #[tokio::test]
    async fn ack_settles_a_delivery_exactly_once() {
        let ch = channel().await;
        ch.declare_exchange("orders").await.unwrap();
        let q = ch.declare_queue().await.unwrap();
        ch.bind_queue(&q, "orders").await.unwrap();
        ch.publish("orders", b"m1".to_vec()).await.unwrap();

        let mut rx = ch.consume(&q).await.unwrap();
        let delivery = rx.recv().await.unwrap();
        ch.ack(&q, delivery.tag).await.unwrap();

        // Settling the same tag twice is a protocol error.
        assert!(matches!(
            ch.ack(&q, delivery.tag).await,
            Err(TransportError::UnknownTag(_))
        ));
    }

    #[tokio::test]
    async fn nack_with_requeue_redelivers_under_a_fresh_tag() {
        let ch = channel().await;
        ch.declare_exchange("orders").await.unwrap();
        let q = ch.declare_queue().await.unwrap();
        ch.bind_queue(&q, "orders").await.unwrap();
        ch.publish("orders", b"m1".to_vec()).await.unwrap();

        let mut rx = ch.consume(&q).await.unwrap();
        let first = rx.recv().await.unwrap();
        ch.nack(&q, first.tag, true).await.unwrap();

        let second = rx.recv().await.unwrap();
        assert_eq!(second.payload, b"m1".to_vec());
        assert_ne!(second.tag, first.tag);
        ch.ack(&q, second.tag).await.unwrap();
    }

    #[tokio::test]
    async fn nack_without_requeue_drops_the_message() {
        let ch = channel().await;
        ch.declare_exchange("orders").await.unwrap();
        let q = ch.declare_queue().await.unwrap();
        ch.bind_queue(&q, "orders").await.unwrap();
        ch.publish("orders", b"m1".to_vec()).await.unwrap();

        let mut rx = ch.consume(&q).await.unwrap();
        let delivery = rx.recv().await.unwrap();
        ch.nack(&q, delivery.tag, false).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn queues_are_exclusive() {
        let ch = channel().await;
        let q = ch.declare_queue().await.unwrap();
        ch.consume(&q).await.unwrap();
        assert!(matches!(ch.consume(&q).await, Err(TransportError::QueueBusy(_))));
    }

    #[tokio::test]
    async fn unreachable_transport_refuses_connections() {
        let transport = MemoryTransport::new();
        transport.set_reachable(false);
        assert!(matches!(
            transport.connect("mem://local").await,
            Err(TransportError::Connect { .. })
        ));

        transport.set_reachable(true);
        assert!(transport.connect("mem://local").await.is_ok());
    }
}
