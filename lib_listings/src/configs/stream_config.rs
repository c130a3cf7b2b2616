//! # Stream Configuration
//!
//! Everything the stream client needs to run a session: the endpoint, the
//! keepalive interval, the reconnect policy and the store bounds. Hosts build it
//! from whatever layering they like (see the watcher binary for CLI/env/file).

use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::core::StoreLimits;

/// Endpoint used when nothing else is configured.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:3000/ws";
/// Keepalive ping interval on an otherwise idle socket.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(25);
/// Linear backoff step: attempt `n` waits `n` steps.
pub const DEFAULT_RECONNECT_STEP: Duration = Duration::from_millis(1_000);
/// Upper bound of the reconnect delay.
pub const DEFAULT_RECONNECT_MAX: Duration = Duration::from_millis(30_000);

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The endpoint is not a URL.
    #[error("invalid endpoint '{input}': {source}")]
    InvalidEndpoint {
        /// The rejected input.
        input: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },

    /// The endpoint is a URL but not a WebSocket one.
    #[error("endpoint scheme must be ws or wss, got '{0}'")]
    UnsupportedScheme(String),

    /// The store floor is not below the capacity.
    #[error("store floor ({floor}) must be below capacity ({capacity}) and capacity above zero")]
    InvalidLimits {
        /// Configured capacity.
        capacity: usize,
        /// Configured floor.
        floor: usize,
    },

    /// A zero duration where a positive one is required.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Linear, capped reconnect backoff: `min(max_delay, step * attempt)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay added per failed attempt.
    pub step: Duration,
    /// Cap on the delay.
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            step: DEFAULT_RECONNECT_STEP,
            max_delay: DEFAULT_RECONNECT_MAX,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt).min(self.max_delay)
    }
}

/// # Stream Config
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket endpoint, static for the session.
    pub endpoint: Url,
    /// Interval between keepalive pings.
    pub ping_interval: Duration,
    /// Reconnect backoff.
    pub reconnect: ReconnectPolicy,
    /// Store retention bounds.
    pub limits: StoreLimits,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL"),
            ping_interval: DEFAULT_PING_INTERVAL,
            reconnect: ReconnectPolicy::default(),
            limits: StoreLimits::default(),
        }
    }
}

impl StreamConfig {
    /// Default configuration pointed at `endpoint`.
    pub fn for_endpoint(endpoint: &str) -> Result<Self, ConfigError> {
        let config = Self {
            endpoint: parse_endpoint(endpoint)?,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.endpoint.scheme() {
            "ws" | "wss" => {}
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
        if !self.limits.is_valid() {
            return Err(ConfigError::InvalidLimits {
                capacity: self.limits.capacity,
                floor: self.limits.floor,
            });
        }
        if self.ping_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("ping interval"));
        }
        if self.reconnect.step.is_zero() {
            return Err(ConfigError::ZeroDuration("reconnect step"));
        }
        Ok(())
    }
}

/// Parses and scheme-checks a WebSocket endpoint.
pub fn parse_endpoint(input: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(input).map_err(|source| ConfigError::InvalidEndpoint {
        input: input.to_string(),
        source,
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}
