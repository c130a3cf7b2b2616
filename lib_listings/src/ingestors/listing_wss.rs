//! # Listing WSS Ingestor
//!
//! Keeps one logical WebSocket connection to the listing feed alive for the
//! lifetime of a session and feeds every inbound frame to the
//! [`BatchProcessor`].
//!
//! ## States
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Closing | Failed -> Retrying -> Connecting ...
//! ```
//!
//! A failed connect goes straight from `Connecting` to `Failed`. Each close or
//! failure bumps the [`Backoff`] counter; a successful connect resets it. The
//! only timer is the reconnect delay, raced against the session's cancellation
//! token, so teardown can never be followed by a late reconnect.
//!
//! ## Keepalive
//!
//! A ping goes out every `ping_interval`. There is no read timeout: the feed
//! may stay silent for as long as it likes between listings.

use std::fmt;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{interval_at, sleep, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::backoff::Backoff;
use super::processor::{BatchProcessor, IngestStats};
use crate::configs::StreamConfig;

type FeedSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long teardown waits for the close handshake to be written.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Connection state of the stream client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not going to be (initial state, and after teardown).
    Disconnected,
    /// Connection attempt in flight.
    Connecting,
    /// Socket open, frames flowing.
    Connected,
    /// Peer closed the socket, or teardown is closing it.
    Closing,
    /// Connect or transport error.
    Failed,
    /// Waiting out the backoff delay before the next attempt.
    Retrying {
        /// Attempts since the last successful connect.
        attempt: u32,
        /// Delay before the next attempt.
        delay: Duration,
    },
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Closing => write!(f, "closing"),
            ConnectionState::Failed => write!(f, "failed"),
            ConnectionState::Retrying { attempt, delay } => {
                write!(f, "retrying (attempt {} in {}ms)", attempt, delay.as_millis())
            }
        }
    }
}

/// Why a link to the feed ended. Never leaves the reconnect loop except through logs.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The WebSocket handshake (or the TCP/TLS connect under it) failed.
    #[error("connect failed: {0}")]
    Connect(#[source] WsError),
    /// Sending the keepalive ping failed.
    #[error("keepalive ping failed: {0}")]
    Keepalive(#[source] WsError),
    /// Reading from an open socket failed.
    #[error("transport error: {0}")]
    Transport(#[from] WsError),
    /// The peer closed the socket.
    #[error("closed by peer: {0}")]
    Closed(String),
}

/// Why a connected socket stopped being read.
enum LinkEnd {
    /// Session cancelled; do not reconnect.
    Teardown,
    Lost(StreamError),
}

/// # Listing WSS Ingestor
pub struct ListingWssIngestor {
    config: StreamConfig,
    processor: BatchProcessor,
    state: watch::Sender<ConnectionState>,
}

impl ListingWssIngestor {
    /// Creates the client. Nothing connects until [`ListingWssIngestor::run`].
    pub fn new(config: StreamConfig, processor: BatchProcessor) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            processor,
            state,
        }
    }

    /// Receiver for state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Session counters.
    pub fn stats(&self) -> &std::sync::Arc<IngestStats> {
        self.processor.stats()
    }

    /// # Main Execution Loop
    ///
    /// Connects, reads until the link ends, waits out the backoff and repeats,
    /// until `cancel` fires. Transport problems never escape this loop.
    pub async fn run(self, cancel: CancellationToken) {
        let mut backoff = Backoff::new(self.config.reconnect);

        loop {
            let reason = match self.connect(&cancel).await {
                None => break,
                Some(Ok(socket)) => {
                    backoff.reset();
                    self.processor.stats().record_connection();
                    self.set_state(ConnectionState::Connected);
                    self.processor.alerting().on_connected();

                    match self.pump(socket, &cancel).await {
                        LinkEnd::Teardown => break,
                        LinkEnd::Lost(err @ StreamError::Closed(_)) => {
                            log::warn!("Feed {}", err);
                            self.set_state(ConnectionState::Closing);
                            self.processor.alerting().on_closed();
                            err
                        }
                        LinkEnd::Lost(err) => {
                            log::error!("Feed failed: {}", err);
                            self.set_state(ConnectionState::Failed);
                            self.processor.alerting().on_failed();
                            err
                        }
                    }
                }
                Some(Err(err)) => {
                    log::error!("{}: {}", self.config.endpoint, err);
                    self.set_state(ConnectionState::Failed);
                    self.processor.alerting().on_failed();
                    err
                }
            };

            let delay = backoff.next_delay();
            log::warn!(
                "Reconnect in {}ms (attempt={}) reason={}",
                delay.as_millis(),
                backoff.attempt(),
                reason
            );
            self.set_state(ConnectionState::Retrying {
                attempt: backoff.attempt(),
                delay,
            });

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Disconnected);
        log::info!("Listing stream client stopped");
    }

    /// Opens a fresh socket. Any previous socket was dropped when its pump returned.
    ///
    /// # Returns
    /// `None` if cancelled while connecting.
    async fn connect(&self, cancel: &CancellationToken) -> Option<Result<FeedSocket, StreamError>> {
        self.set_state(ConnectionState::Connecting);
        log::info!("Connecting to: {}", self.config.endpoint);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = connect_async(self.config.endpoint.as_str()) => Some(
                result
                    .map(|(socket, response)| {
                        log::info!("Connected to {} (HTTP {})", self.config.endpoint, response.status());
                        socket
                    })
                    .map_err(StreamError::Connect),
            ),
        }
    }

    /// Reads frames until the link ends or the session is cancelled.
    async fn pump(&self, mut socket: FeedSocket, cancel: &CancellationToken) -> LinkEnd {
        let period = self.config.ping_interval;
        let mut keepalive = interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.teardown(&mut socket).await,
                _ = keepalive.tick() => {
                    if let Err(e) = socket.send(Message::Ping(Default::default())).await {
                        return LinkEnd::Lost(StreamError::Keepalive(e));
                    }
                }
                frame = socket.next() => match self.on_frame(frame, cancel) {
                    None => {}
                    Some(LinkEnd::Teardown) => return self.teardown(&mut socket).await,
                    Some(end) => return end,
                },
            }
        }
    }

    /// Applies one inbound frame. `None` means keep reading.
    ///
    /// A frame read in the same instant as teardown is dropped unprocessed.
    fn on_frame(
        &self,
        frame: Option<Result<Message, WsError>>,
        cancel: &CancellationToken,
    ) -> Option<LinkEnd> {
        if cancel.is_cancelled() {
            return Some(LinkEnd::Teardown);
        }
        match frame {
            Some(Ok(Message::Text(text))) => {
                self.processor.process_text(text.as_str());
                None
            }
            Some(Ok(Message::Binary(bytes))) => {
                self.processor.process_binary(&bytes);
                None
            }
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|f| format!("{} {}", u16::from(f.code), &*f.reason))
                    .unwrap_or_else(|| "no close frame".to_string());
                Some(LinkEnd::Lost(StreamError::Closed(reason)))
            }
            Some(Ok(_)) => None,
            Some(Err(e)) => Some(LinkEnd::Lost(e.into())),
            None => Some(LinkEnd::Lost(StreamError::Closed("stream ended".to_string()))),
        }
    }

    async fn teardown(&self, socket: &mut FeedSocket) -> LinkEnd {
        self.set_state(ConnectionState::Closing);
        Self::close_normal(socket).await;
        LinkEnd::Teardown
    }

    /// Best-effort normal closure (code 1000); errors and slow peers are ignored.
    async fn close_normal(socket: &mut FeedSocket) {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "session ended".into(),
        };
        match timeout(CLOSE_TIMEOUT, socket.close(Some(frame))).await {
            Ok(Ok(())) => log::debug!("Close frame sent"),
            Ok(Err(e)) => log::debug!("Close handshake failed: {}", e),
            Err(_) => log::debug!("Close handshake timed out"),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            log::debug!("Stream state: {} -> {}", previous, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Alerting, ListingStore, LogSink, Notifier, Presence, Snapshot};
    use std::sync::Arc;

    #[test]
    fn retrying_state_renders_attempt_and_delay() {
        let state = ConnectionState::Retrying {
            attempt: 3,
            delay: Duration::from_millis(3_000),
        };
        assert_eq!(state.to_string(), "retrying (attempt 3 in 3000ms)");
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
    }

    fn ingestor() -> (ListingWssIngestor, Arc<ListingStore>) {
        let store = Arc::new(ListingStore::default());
        let (notifier, _delivery) = Notifier::new(Snapshot::default());
        let alerting = Arc::new(Alerting::new(Arc::new(LogSink), Presence::new(true)));
        let processor = BatchProcessor::new(Arc::clone(&store), notifier, alerting);
        (ListingWssIngestor::new(StreamConfig::default(), processor), store)
    }

    fn batch_frame(json: &str) -> Option<Result<Message, WsError>> {
        Some(Ok(Message::text(json.to_string())))
    }

    #[test]
    fn frame_racing_teardown_is_not_applied() {
        let (ingestor, store) = ingestor();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let end = ingestor.on_frame(batch_frame(r#"[{"id":"late"}]"#), &cancel);
        assert!(matches!(end, Some(LinkEnd::Teardown)));
        assert!(store.is_empty());
        assert_eq!(ingestor.stats().frames(), 0);
    }

    #[test]
    fn frames_are_applied_while_live() {
        let (ingestor, store) = ingestor();
        let cancel = CancellationToken::new();

        assert!(ingestor.on_frame(batch_frame(r#"[{"id":"a"}]"#), &cancel).is_none());
        assert!(store.contains("a"));
        assert!(matches!(
            ingestor.on_frame(None, &cancel),
            Some(LinkEnd::Lost(StreamError::Closed(_)))
        ));
    }

    #[test]
    fn stream_errors_describe_the_cause() {
        let closed = StreamError::Closed("1000 bye".into());
        assert_eq!(closed.to_string(), "closed by peer: 1000 bye");
        let transport: StreamError = WsError::ConnectionClosed.into();
        assert!(transport.to_string().starts_with("transport error"));
    }
}
