//! # Batch Processor
//!
//! The per-frame work of the ingestion path: decode, merge, and, when the merge
//! added something, publish and alert. Kept free of any socket so it can be
//! driven directly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::{Alerting, ListingStore, Notifier};
use crate::model::{decode_batch, codec::decode_binary_batch, DecodeError, Listing};

/// Result of processing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame decoded; `added` listings were new.
    Merged {
        /// Listings in the batch.
        received: usize,
        /// Listings actually inserted.
        added: usize,
    },
    /// The frame was malformed and dropped.
    Rejected,
}

/// Counters for one session. All relaxed; they are diagnostics, not synchronization.
#[derive(Debug, Default)]
pub struct IngestStats {
    frames: AtomicU64,
    rejected: AtomicU64,
    added: AtomicU64,
    connections: AtomicU64,
}

impl IngestStats {
    /// Data frames seen (text or binary).
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Frames dropped as malformed.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Listings inserted into the store.
    pub fn added(&self) -> u64 {
        self.added.load(Ordering::Relaxed)
    }

    /// Successful connections, including reconnects.
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    pub(crate) fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }
}

/// # Batch Processor
#[derive(Clone)]
pub struct BatchProcessor {
    store: Arc<ListingStore>,
    notifier: Notifier,
    alerting: Arc<Alerting>,
    stats: Arc<IngestStats>,
}

impl BatchProcessor {
    /// Wires a processor to its collaborators.
    pub fn new(store: Arc<ListingStore>, notifier: Notifier, alerting: Arc<Alerting>) -> Self {
        Self {
            store,
            notifier,
            alerting,
            stats: Arc::new(IngestStats::default()),
        }
    }

    /// Session counters.
    pub fn stats(&self) -> &Arc<IngestStats> {
        &self.stats
    }

    /// The alerting front this processor drives.
    pub fn alerting(&self) -> &Arc<Alerting> {
        &self.alerting
    }

    /// Processes a text frame.
    pub fn process_text(&self, text: &str) -> FrameOutcome {
        self.process(decode_batch(text))
    }

    /// Processes a binary frame.
    pub fn process_binary(&self, bytes: &[u8]) -> FrameOutcome {
        self.process(decode_binary_batch(bytes))
    }

    fn process(&self, decoded: Result<Vec<Listing>, DecodeError>) -> FrameOutcome {
        self.stats.frames.fetch_add(1, Ordering::Relaxed);

        let batch = match decoded {
            Ok(batch) => batch,
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                log::warn!("Dropping frame: {}", e);
                return FrameOutcome::Rejected;
            }
        };

        let received = batch.len();
        let added = self.store.merge(batch);
        if added > 0 {
            self.stats.added.fetch_add(added as u64, Ordering::Relaxed);
            self.notifier.publish(self.store.snapshot());
            self.alerting.on_new_records(added);
            log::info!("Merged batch: {} received, {} new, {} retained", received, added, self.store.len());
        } else {
            log::debug!("Batch of {} brought nothing new", received);
        }

        FrameOutcome::Merged { received, added }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LogSink, Presence, Snapshot};

    fn processor() -> (BatchProcessor, Arc<ListingStore>, Notifier) {
        let store = Arc::new(ListingStore::default());
        let (notifier, _delivery) = Notifier::new(Snapshot::default());
        let alerting = Arc::new(Alerting::new(Arc::new(LogSink), Presence::new(true)));
        let processor = BatchProcessor::new(Arc::clone(&store), notifier.clone(), alerting);
        (processor, store, notifier)
    }

    #[test]
    fn malformed_frame_between_good_ones_only_counts_good_merges() {
        let (processor, store, _) = processor();

        assert_eq!(
            processor.process_text(r#"[{"id":"A"},{"id":"B"},{"id":"C"}]"#),
            FrameOutcome::Merged { received: 3, added: 3 }
        );
        assert_eq!(processor.process_text("{{ definitely not json"), FrameOutcome::Rejected);
        assert_eq!(
            processor.process_text(r#"[{"id":"B"},{"id":"D"}]"#),
            FrameOutcome::Merged { received: 2, added: 1 }
        );

        let stats = processor.stats();
        assert_eq!(stats.frames(), 3);
        assert_eq!(stats.rejected(), 1);
        assert_eq!(stats.added(), 4);
        assert_eq!(stats.connections(), 0);
        assert_eq!(store.snapshot().ids(), vec!["D", "C", "B", "A"]);
    }

    #[test]
    fn duplicate_only_frame_changes_nothing() {
        let (processor, store, _) = processor();
        processor.process_text(r#"[{"id":"A"}]"#);
        let before = store.snapshot();

        assert_eq!(
            processor.process_text(r#"[{"id":"A"}]"#),
            FrameOutcome::Merged { received: 1, added: 0 }
        );
        assert!(before.ptr_eq(&store.snapshot()));
        assert_eq!(processor.alerting().status(), crate::core::LinkStatus::ConnectedWithNew(1));
    }

    #[test]
    fn binary_frames_use_the_same_path() {
        let (processor, store, _) = processor();
        assert_eq!(
            processor.process_binary(br#"[{"id":"bin"}]"#),
            FrameOutcome::Merged { received: 1, added: 1 }
        );
        assert!(store.contains("bin"));
        assert_eq!(processor.process_binary(&[0xc3, 0x28]), FrameOutcome::Rejected);
    }
}
