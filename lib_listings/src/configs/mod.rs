//! # Configuration Modules
//!
//! Validated settings for a streaming session.

/// Endpoint, keepalive, backoff and store bounds.
pub mod stream_config;

pub use stream_config::{parse_endpoint, ConfigError, ReconnectPolicy, StreamConfig};
