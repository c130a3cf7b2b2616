//! # Snapshot Notifier
//!
//! Fan-out of store snapshots to registered listeners. Listeners are never called
//! from the ingestion path or from the thread that subscribes: every call is
//! handed over an unbounded channel to one [`DeliveryLoop`], which is the single
//! delivery context of the session.
//!
//! ## Ordering
//!
//! Registry changes and publishes are serialized by one mutex, and each of them
//! enqueues while still holding it. The delivery queue therefore sees initial
//! deliveries and broadcasts in the same order as the calls that caused them; a
//! new subscriber never receives an older snapshot after a newer one.
//!
//! ## Isolation
//!
//! A listener that returns an error or panics is logged and skipped; the other
//! listeners and the ingestion path carry on.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::store::Snapshot;

/// A consumer of store snapshots, typically a presentation layer.
pub trait SnapshotListener: Send + Sync + 'static {
    /// Called on the delivery loop with the latest snapshot.
    fn on_snapshot(&self, snapshot: &Snapshot) -> anyhow::Result<()>;
}

impl<F> SnapshotListener for F
where
    F: Fn(&Snapshot) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn on_snapshot(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        self(snapshot)
    }
}

/// Handle returned by [`Notifier::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Subscriber {
    id: SubscriptionId,
    listener: Arc<dyn SnapshotListener>,
}

struct Registry {
    subscribers: Vec<Subscriber>,
    latest: Snapshot,
}

enum Delivery {
    /// First delivery to a fresh subscriber.
    Initial(SubscriptionId, Snapshot),
    /// Fan-out to everyone registered at delivery time.
    Broadcast(Snapshot),
}

/// # Notifier
///
/// Cheap to clone; all clones share one registry and one delivery queue.
#[derive(Clone)]
pub struct Notifier {
    registry: Arc<Mutex<Registry>>,
    queue: mpsc::UnboundedSender<Delivery>,
    next_id: Arc<AtomicU64>,
}

impl Notifier {
    /// Creates a notifier and the loop that performs its deliveries.
    ///
    /// `initial` is what a subscriber receives before the first publish.
    pub fn new(initial: Snapshot) -> (Self, DeliveryLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Mutex::new(Registry {
            subscribers: Vec::new(),
            latest: initial,
        }));

        let notifier = Self {
            registry: Arc::clone(&registry),
            queue: tx,
            next_id: Arc::new(AtomicU64::new(1)),
        };
        let delivery = DeliveryLoop { registry, queue: rx };
        (notifier, delivery)
    }

    /// Registers a listener and schedules one delivery of the latest snapshot to it.
    pub fn subscribe<L>(&self, listener: L) -> SubscriptionId
    where
        L: SnapshotListener,
    {
        self.subscribe_arc(Arc::new(listener))
    }

    /// Same as [`Notifier::subscribe`] for an already shared listener.
    pub fn subscribe_arc(&self, listener: Arc<dyn SnapshotListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut registry = self.lock();
        registry.subscribers.push(Subscriber { id, listener });
        let _ = self.queue.send(Delivery::Initial(id, registry.latest.clone()));
        log::debug!("Listener {} subscribed ({} total)", id, registry.subscribers.len());
        id
    }

    /// Removes a listener. Deliveries still queued for it are dropped.
    ///
    /// # Returns
    /// `false` if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.lock();
        let before = registry.subscribers.len();
        registry.subscribers.retain(|s| s.id != id);
        let removed = registry.subscribers.len() != before;
        if removed {
            log::debug!("Listener {} unsubscribed", id);
        }
        removed
    }

    /// Schedules delivery of `snapshot` to every registered listener.
    pub fn publish(&self, snapshot: Snapshot) {
        let mut registry = self.lock();
        registry.latest = snapshot.clone();
        if registry.subscribers.is_empty() {
            return;
        }
        if self.queue.send(Delivery::Broadcast(snapshot)).is_err() {
            log::debug!("Delivery loop gone, snapshot not published");
        }
    }

    /// Number of registered listeners.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// # Delivery Loop
///
/// The designated delivery context. Run it once, on whatever task or runtime the
/// listeners expect to be called from.
pub struct DeliveryLoop {
    registry: Arc<Mutex<Registry>>,
    queue: mpsc::UnboundedReceiver<Delivery>,
}

impl DeliveryLoop {
    /// Delivers queued snapshots until `cancel` fires or every [`Notifier`] is dropped.
    ///
    /// Cancellation is checked before each delivery, so nothing queued before
    /// teardown reaches a listener after it.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let delivery = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = self.queue.recv() => match next {
                    Some(d) => d,
                    None => break,
                },
            };

            match delivery {
                Delivery::Initial(id, snapshot) => {
                    let target = self.listeners(|s| s.id == id);
                    Self::deliver(&target, &snapshot);
                }
                Delivery::Broadcast(snapshot) => {
                    let targets = self.listeners(|_| true);
                    Self::deliver(&targets, &snapshot);
                }
            }
        }
        log::debug!("Delivery loop stopped");
    }

    /// Copies out the matching listeners so none is called under the registry lock.
    fn listeners(
        &self,
        filter: impl Fn(&Subscriber) -> bool,
    ) -> Vec<(SubscriptionId, Arc<dyn SnapshotListener>)> {
        let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry
            .subscribers
            .iter()
            .filter(|s| filter(s))
            .map(|s| (s.id, Arc::clone(&s.listener)))
            .collect()
    }

    fn deliver(targets: &[(SubscriptionId, Arc<dyn SnapshotListener>)], snapshot: &Snapshot) {
        for (id, listener) in targets {
            match catch_unwind(AssertUnwindSafe(|| listener.on_snapshot(snapshot))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::warn!("Listener {} failed: {:#}", id, e),
                Err(_) => log::error!("Listener {} panicked during delivery", id),
            }
        }
    }
}
