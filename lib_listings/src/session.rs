//! # Listing Session
//!
//! One streaming session: the store, the notifier and its delivery loop, the
//! alerting front and the stream client, all spawned under a single
//! cancellation token. This is the surface the presentation layer talks to.
//!
//! Teardown cancels the token once; the stream client stops reconnecting, the
//! delivery loop stops delivering, and [`ListingSession::shutdown`] waits for
//! both before clearing the store.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::configs::{ConfigError, StreamConfig};
use crate::core::{
    AlertSink, Alerting, LinkStatus, ListingStore, Notifier, Presence, Snapshot, SnapshotListener,
    SubscriptionId,
};
use crate::ingestors::{BatchProcessor, ConnectionState, IngestStats, ListingWssIngestor};

/// # Listing Session
pub struct ListingSession {
    store: Arc<ListingStore>,
    notifier: Notifier,
    alerting: Arc<Alerting>,
    stats: Arc<IngestStats>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ListingSession {
    /// Validates `config` and starts streaming. Must be called inside a tokio runtime.
    pub fn start(
        config: StreamConfig,
        sink: Arc<dyn AlertSink>,
        presence: Presence,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let store = Arc::new(ListingStore::new(config.limits));
        let (notifier, delivery) = Notifier::new(store.snapshot());
        let alerting = Arc::new(Alerting::new(sink, presence));
        alerting.refresh_status();

        let processor = BatchProcessor::new(Arc::clone(&store), notifier.clone(), Arc::clone(&alerting));
        let stats = Arc::clone(processor.stats());
        let ingestor = ListingWssIngestor::new(config, processor);
        let state = ingestor.subscribe_state();

        let cancel = CancellationToken::new();
        let tasks = vec![
            tokio::spawn(delivery.run(cancel.child_token())),
            tokio::spawn(ingestor.run(cancel.child_token())),
        ];

        Ok(Self {
            store,
            notifier,
            alerting,
            stats,
            state,
            cancel,
            tasks,
        })
    }

    /// Registers a listener; it receives the current snapshot once, then every change.
    pub fn subscribe<L>(&self, listener: L) -> SubscriptionId
    where
        L: SnapshotListener,
    {
        self.notifier.subscribe(listener)
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// The store contents right now, newest first.
    pub fn current_snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver for connection state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Current link status text source.
    pub fn status(&self) -> LinkStatus {
        self.alerting.status()
    }

    /// The presence flag the alerting consults.
    pub fn presence(&self) -> &Presence {
        self.alerting.presence()
    }

    /// Session counters.
    pub fn stats(&self) -> &Arc<IngestStats> {
        &self.stats
    }

    /// Ends the session: cancels everything, waits for the tasks, clears the store.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                log::error!("Session task ended abnormally: {}", e);
            }
        }
        self.store.reset();
        log::info!("Listing session closed");
    }
}

impl Drop for ListingSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
