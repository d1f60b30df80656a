//! Lifecycle and progress events, and the bus that fans them out to
//! observers.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::request::Request;

/// A lifecycle or progress transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StatusEvent {
    /// Queue depth changed or was refreshed
    Enqueued { queue_depth: usize },
    Started { request: Request },
    /// Percent complete of the request in flight, always within 0..=100
    Progress { percent: u8 },
    Completed { request: Request },
    Failed { request: Request, reason: String },
}

impl StatusEvent {
    /// The request this event belongs to, if any
    pub fn request(&self) -> Option<&Request> {
        match self {
            StatusEvent::Started { request }
            | StatusEvent::Completed { request }
            | StatusEvent::Failed { request, .. } => Some(request),
            StatusEvent::Enqueued { .. } | StatusEvent::Progress { .. } => None,
        }
    }

    /// `Completed` or `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StatusEvent::Completed { .. } | StatusEvent::Failed { .. }
        )
    }
}

/// Handle identifying one subscription on a [`StatusBus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Receiving end of a subscription
pub struct Subscription {
    pub id: SubscriptionId,
    pub events: UnboundedReceiver<StatusEvent>,
}

impl Subscription {
    /// Next event, or `None` once unsubscribed
    pub async fn recv(&mut self) -> Option<StatusEvent> {
        self.events.recv().await
    }
}

/// Fan-out channel for [`StatusEvent`]s.
///
/// Every published event reaches every current subscriber, in publication
/// order. Each subscriber has its own unbounded buffer, so `publish` never
/// waits on a slow observer.
#[derive(Clone, Default)]
pub struct StatusBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<SubscriptionId, UnboundedSender<StatusEvent>>>,
}

impl StatusBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and hand back its receiver
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        debug!("Subscriber {:?} registered", id);
        Subscription { id, events: rx }
    }

    /// Register a handler that runs on its own task for every event.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe_fn<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(StatusEvent) + Send + 'static,
    {
        let Subscription { id, mut events } = self.subscribe();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                handler(event);
            }
        });
        id
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    ///
    /// Events already buffered for it are still delivered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some();
        if removed {
            debug!("Subscriber {:?} removed", id);
        }
        removed
    }

    /// Deliver `event` to every current subscriber
    pub fn publish(&self, event: StatusEvent) {
        let mut gone = Vec::new();
        {
            let subscribers = self
                .inner
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            for (id, tx) in subscribers.iter() {
                if tx.send(event.clone()).is_err() {
                    gone.push(*id);
                }
            }
        }

        // Receivers dropped without unsubscribing
        if !gone.is_empty() {
            let mut subscribers = self
                .inner
                .subscribers
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            for id in gone {
                subscribers.remove(&id);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
