//! Broadcast hub fanning queue messages out to live subscribers.
//!
//! A single task owns the subscriber set. Producers and subscriber
//! sessions talk to it only through [`HubHandle`], whose commands travel
//! over one FIFO channel, so a broadcast sent after a removal is never
//! delivered to the removed subscriber.
//!
//! Each subscriber has a bounded outbound buffer. When a buffer is full the
//! message is dropped for that subscriber only; the hub never waits on a
//! slow client.

use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Default per-subscriber outbound buffer size.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 32;

/// Buffer of the hub's own command channel.
const COMMAND_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Debug, Error)]
#[error("broadcast hub is not running")]
pub struct HubClosed;

/// The receiving end of a subscriber's outbound buffer.
///
/// `outbound` yields `None` once the hub has removed the subscriber.
pub struct Subscription {
    pub id: SubscriberId,
    pub outbound: mpsc::Receiver<Bytes>,
}

struct Subscriber {
    outbound: mpsc::Sender<Bytes>,
}

enum HubCommand {
    Add(SubscriberId, Subscriber),
    Remove(SubscriberId),
    Broadcast(Bytes),
    Count(oneshot::Sender<usize>),
}

/// Cloneable handle to a running [`Hub`].
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
    next_id: Arc<AtomicU64>,
    subscriber_buffer: usize,
}

impl HubHandle {
    /// Register a new subscriber and return its buffer.
    pub async fn subscribe(&self) -> Result<Subscription, HubClosed> {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.subscriber_buffer);
        self.send(HubCommand::Add(id, Subscriber { outbound: tx }))
            .await?;
        Ok(Subscription { id, outbound: rx })
    }

    /// Unregister a subscriber. Removing an unknown id is a no-op.
    pub async fn remove(&self, id: SubscriberId) -> Result<(), HubClosed> {
        self.send(HubCommand::Remove(id)).await
    }

    /// Queue `message` for every subscriber registered when the hub
    /// processes it.
    pub async fn broadcast(&self, message: impl Into<Bytes>) -> Result<(), HubClosed> {
        self.send(HubCommand::Broadcast(message.into())).await
    }

    /// Number of registered subscribers, observed after every command sent
    /// before this call.
    pub async fn subscriber_count(&self) -> Result<usize, HubClosed> {
        let (tx, rx) = oneshot::channel();
        self.send(HubCommand::Count(tx)).await?;
        rx.await.map_err(|_| HubClosed)
    }

    async fn send(&self, command: HubCommand) -> Result<(), HubClosed> {
        self.commands.send(command).await.map_err(|_| HubClosed)
    }
}

/// The coordinating loop. Owns the subscriber set exclusively.
pub struct Hub {
    commands: mpsc::Receiver<HubCommand>,
    subscribers: HashMap<SubscriberId, Subscriber>,
}

impl Hub {
    /// Create a hub whose subscribers get `subscriber_buffer` slots each.
    pub fn new(subscriber_buffer: usize) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let hub = Self {
            commands: rx,
            subscribers: HashMap::new(),
        };
        let handle = HubHandle {
            commands: tx,
            next_id: Arc::new(AtomicU64::new(1)),
            subscriber_buffer: subscriber_buffer.max(1),
        };
        (hub, handle)
    }

    /// Create a hub and run it on a new task.
    pub fn spawn(subscriber_buffer: usize) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(subscriber_buffer);
        (handle, tokio::spawn(hub.run()))
    }

    /// Process commands until every [`HubHandle`] is dropped.
    ///
    /// Remaining subscribers are dropped on exit, closing their buffers.
    pub async fn run(mut self) {
        info!("Broadcast hub started");
        while let Some(command) = self.commands.recv().await {
            self.handle(command);
        }
        info!(
            remaining = self.subscribers.len(),
            "Broadcast hub stopped"
        );
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Add(id, subscriber) => {
                self.subscribers.insert(id, subscriber);
                debug!(%id, total = self.subscribers.len(), "Subscriber added");
            }
            HubCommand::Remove(id) => {
                // Dropping the sender closes the buffer; the session's
                // writer then closes the connection.
                if self.subscribers.remove(&id).is_some() {
                    debug!(%id, total = self.subscribers.len(), "Subscriber removed");
                }
            }
            HubCommand::Broadcast(message) => self.broadcast(message),
            HubCommand::Count(reply) => {
                let _ = reply.send(self.subscribers.len());
            }
        }
    }

    fn broadcast(&self, message: Bytes) {
        for (id, subscriber) in &self.subscribers {
            match subscriber.outbound.try_send(message.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(%id, "Subscriber buffer full, dropping message");
                }
                // Writer already gone; its Remove is on the way.
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let (hub, _task) = Hub::spawn(DEFAULT_SUBSCRIBER_BUFFER);
        let mut subs = Vec::new();
        for _ in 0..3 {
            subs.push(hub.subscribe().await.unwrap());
        }

        hub.broadcast("Cadastro de EMPRESA X").await.unwrap();
        assert_eq!(hub.subscriber_count().await.unwrap(), 3);

        for sub in &mut subs {
            assert_eq!(
                sub.outbound.recv().await.unwrap(),
                Bytes::from_static(b"Cadastro de EMPRESA X")
            );
        }
    }

    #[tokio::test]
    async fn test_saturated_subscriber_misses_message_others_receive() {
        let (hub, _task) = Hub::spawn(1);
        let mut slow = hub.subscribe().await.unwrap();
        let mut fast = hub.subscribe().await.unwrap();

        hub.broadcast("one").await.unwrap();
        assert_eq!(fast.outbound.recv().await.unwrap(), "one");

        // slow still holds "one" and has no room left
        hub.broadcast("two").await.unwrap();
        hub.subscriber_count().await.unwrap();

        assert_eq!(fast.outbound.try_recv().unwrap(), "two");
        assert_eq!(slow.outbound.try_recv().unwrap(), "one");
        assert!(matches!(slow.outbound.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_broadcast_does_not_wait_on_stuck_subscriber() {
        let (hub, _task) = Hub::spawn(1);
        let _stuck = hub.subscribe().await.unwrap();

        let sent = tokio::time::timeout(std::time::Duration::from_secs(1), async {
            for i in 0..1000 {
                hub.broadcast(format!("msg {i}")).await.unwrap();
            }
        })
        .await;
        assert!(sent.is_ok());
        assert_eq!(hub.subscriber_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_closes_buffer_and_stops_delivery() {
        let (hub, _task) = Hub::spawn(4);
        let mut sub = hub.subscribe().await.unwrap();

        hub.broadcast("before").await.unwrap();
        hub.remove(sub.id).await.unwrap();
        hub.broadcast("after").await.unwrap();
        hub.subscriber_count().await.unwrap();

        assert_eq!(sub.outbound.recv().await.unwrap(), "before");
        assert!(sub.outbound.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_double_remove_is_noop() {
        let (hub, _task) = Hub::spawn(4);
        let a = hub.subscribe().await.unwrap();
        let _b = hub.subscribe().await.unwrap();

        hub.remove(a.id).await.unwrap();
        hub.remove(a.id).await.unwrap();
        assert_eq!(hub.subscriber_count().await.unwrap(), 1);

        // the loop is still alive
        hub.broadcast("still running").await.unwrap();
        assert_eq!(hub.subscriber_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_subscriber_ids_are_unique() {
        let (hub, _task) = Hub::spawn(1);
        let a = hub.subscribe().await.unwrap();
        let b = hub.subscribe().await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_hub_stops_when_handles_dropped() {
        let (hub, task) = Hub::spawn(4);
        let mut sub = hub.subscribe().await.unwrap();
        drop(hub);

        task.await.unwrap();
        assert!(sub.outbound.recv().await.is_none());
    }
}
