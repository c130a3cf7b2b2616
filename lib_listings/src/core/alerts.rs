//! # Presence-Gated Alerting
//!
//! Decides how a batch of new listings is announced. While the user is watching
//! (the host's foreground flag is set) a short cue is enough; otherwise a
//! persistent notification carrying the count is raised. The running link status
//! ("connected", "connected (3 new)", ...) is pushed to the same sink.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// # Presence
///
/// The "is the consumer actively watching" flag, owned by the host's lifecycle
/// layer. Reads are a single atomic load at the moment of each event.
#[derive(Debug, Clone, Default)]
pub struct Presence(Arc<AtomicBool>);

impl Presence {
    /// Creates a flag with the given initial value.
    pub fn new(foreground: bool) -> Self {
        Self(Arc::new(AtomicBool::new(foreground)))
    }

    /// Updates the flag. Called by the lifecycle layer.
    pub fn set_foreground(&self, foreground: bool) {
        self.0.store(foreground, Ordering::Release);
    }

    /// Flips the flag and returns the new value.
    pub fn toggle(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::AcqRel)
    }

    /// Current value.
    pub fn is_foreground(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The notification surface the alerting logic drives.
pub trait AlertSink: Send + Sync {
    /// Lightweight cue while the user is watching (e.g. a short sound).
    fn play_cue(&self);
    /// Persistent notification while the user is away.
    fn notify_new_listings(&self, count: usize);
    /// Replaces the persistent status text. Must be safe to call repeatedly.
    fn update_status(&self, text: &str);
}

/// An [`AlertSink`] that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn play_cue(&self) {
        log::info!("New listings arrived");
    }

    fn notify_new_listings(&self, count: usize) {
        log::warn!("{} new listing(s) found", count);
    }

    fn update_status(&self, text: &str) {
        log::info!("Status: {}", text);
    }
}

/// Running link status as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Session created, no connection yet.
    Starting,
    /// Connected, nothing new since the last (re)connect.
    Connected,
    /// Connected, and the latest batch brought this many new listings.
    ConnectedWithNew(usize),
    /// The peer closed the connection.
    Disconnected,
    /// The connection attempt or the transport failed.
    Failed,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStatus::Starting => write!(f, "starting"),
            LinkStatus::Connected => write!(f, "connected"),
            LinkStatus::ConnectedWithNew(n) => write!(f, "connected ({} new)", n),
            LinkStatus::Disconnected => write!(f, "disconnected"),
            LinkStatus::Failed => write!(f, "connection failed"),
        }
    }
}

/// # Alerting
///
/// Turns stream events into sink calls. Holds the status so it can be re-pushed.
pub struct Alerting {
    sink: Arc<dyn AlertSink>,
    presence: Presence,
    status: Mutex<LinkStatus>,
}

impl Alerting {
    /// Creates the alerting front for `sink`, gated on `presence`.
    pub fn new(sink: Arc<dyn AlertSink>, presence: Presence) -> Self {
        Self {
            sink,
            presence,
            status: Mutex::new(LinkStatus::Starting),
        }
    }

    /// The presence flag consulted on each event.
    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    /// Current status.
    pub fn status(&self) -> LinkStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Announces `count` new listings. Zero is ignored.
    pub fn on_new_records(&self, count: usize) {
        if count == 0 {
            return;
        }
        if self.presence.is_foreground() {
            self.sink.play_cue();
        } else {
            self.sink.notify_new_listings(count);
        }
        self.set_status(LinkStatus::ConnectedWithNew(count));
    }

    /// The stream client reached `Connected`.
    pub fn on_connected(&self) {
        self.set_status(LinkStatus::Connected);
    }

    /// The peer closed the connection.
    pub fn on_closed(&self) {
        self.set_status(LinkStatus::Disconnected);
    }

    /// Connecting or the transport failed.
    pub fn on_failed(&self) {
        self.set_status(LinkStatus::Failed);
    }

    /// Pushes the current status text to the sink again.
    pub fn refresh_status(&self) {
        let text = self.status().to_string();
        self.sink.update_status(&text);
    }

    fn set_status(&self, status: LinkStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
        self.sink.update_status(&status.to_string());
    }
}
