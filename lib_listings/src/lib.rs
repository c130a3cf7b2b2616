//! # lib_listings
//!
//! The streaming core of the listing watcher. A persistent WebSocket feed pushes
//! batches of listings; they are deduplicated into a bounded, newest-first store,
//! and every change is republished as an immutable snapshot to subscribers on a
//! single delivery task. New arrivals additionally raise a presence-gated alert.
//!
//! ```text
//! socket frame -> codec -> ListingStore::merge -> Notifier::publish -> listeners
//!                                          \-> Alerting::on_new_records -> AlertSink
//! ```
//!
//! Each folder module sits behind a cargo feature of the same name; `full`
//! (the default) enables all of them.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// The listing record and its JSON wire codec.
#[cfg(feature = "model")]
pub mod model;

/// Bounded store, snapshot notifier and presence-gated alerting.
#[cfg(feature = "core")]
pub mod core;

/// Validated stream configuration.
#[cfg(feature = "configs")]
pub mod configs;

/// The reconnecting WebSocket stream client.
#[cfg(feature = "ingestors")]
pub mod ingestors;

/// Session wiring: store, notifier, alerting and stream client under one cancellation scope.
#[cfg(feature = "ingestors")]
pub mod session;

/// HTTP detail lookups (phone number, contact).
#[cfg(feature = "retrieve")]
pub mod retrieve;

// --- Public API Re-exports ---
#[cfg(feature = "model")]
pub use model::{decode_batch, DecodeError, Listing};
#[cfg(feature = "core")]
pub use crate::core::{
    AlertSink, Alerting, LinkStatus, ListingStore, LogSink, Notifier, Presence, Snapshot,
    SnapshotListener, StoreLimits, SubscriptionId,
};
#[cfg(feature = "configs")]
pub use configs::{ConfigError, ReconnectPolicy, StreamConfig};
#[cfg(feature = "ingestors")]
pub use ingestors::{
    Backoff, BatchProcessor, ConnectionState, IngestStats, ListingWssIngestor, StreamError,
};
#[cfg(feature = "ingestors")]
pub use session::ListingSession;
