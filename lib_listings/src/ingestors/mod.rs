//! # Data Ingestors Module
//!
//! The network side of the engine: the WebSocket client that keeps the listing
//! feed connected, the reconnect backoff it follows, and the per-frame processor
//! that connects it to the store.
//!
//! - **`listing_wss`**: the reconnecting stream client and its state machine.
//! - **`backoff`**: the attempt counter (linear, capped delays).
//! - **`processor`**: decode, merge, publish, alert; one frame at a time.

/// The reconnecting WebSocket client for the listing feed.
pub mod listing_wss;
/// Reconnect attempt counter.
pub mod backoff;
/// Per-frame decode/merge/publish/alert.
pub mod processor;

// --- Public API Re-exports ---
pub use backoff::Backoff;
pub use listing_wss::{ConnectionState, ListingWssIngestor, StreamError};
pub use processor::{BatchProcessor, FrameOutcome, IngestStats};
