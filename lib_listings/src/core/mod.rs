//! # Core Engine Module
//!
//! The in-process half of the listing stream: everything that happens after a
//! frame is decoded and before a snapshot reaches a consumer.
//!
//! - **`store`**: the bounded, deduplicating, newest-first listing store. Its
//!   only mutation is `merge`; readers take immutable snapshots.
//! - **`notifier`**: the subscriber registry. Snapshots are handed to a single
//!   delivery loop so listeners never run on the ingestion path.
//! - **`alerts`**: presence-gated alerting and the running link status.

/// Bounded, deduplicating, newest-first listing store.
pub mod store;
/// Subscriber registry and the snapshot delivery loop.
pub mod notifier;
/// Presence flag, alert sink and link status.
pub mod alerts;

// --- Public API Re-exports ---
pub use alerts::{AlertSink, Alerting, LinkStatus, LogSink, Presence};
pub use notifier::{DeliveryLoop, Notifier, SnapshotListener, SubscriptionId};
pub use store::{ListingStore, Snapshot, StoreLimits, DEFAULT_CAPACITY, DEFAULT_FLOOR};
