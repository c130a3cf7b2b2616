//! # Listing Watch
//!
//! Connects to the listing feed, prints the newest listings whenever the feed
//! delivers something new and raises an alert per batch: a beep while the
//! terminal is being watched, a highlighted line while it is not.
//!
//! On Unix, `kill -USR1 <pid>` toggles between the two. Ctrl-C or SIGTERM ends
//! the session cleanly.

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;

mod watch_logic;
use watch_logic::{board::BoardPrinter, config, logger, terminal_sink::TerminalSink};

use lib_listings::{ListingSession, Presence};

#[tokio::main]
async fn main() -> Result<()> {
    // Explicitly install the default crypto provider for rustls
    let _ = rustls::crypto::ring::default_provider().install_default();
    let _ = dotenvy::dotenv();

    let config = config::load_config();
    logger::setup_logging(&config.log_dir(), config.log_level(), "listing_watch")?;

    let stream_config = config.stream_config()?;
    log::info!(
        "Watching {} (keep up to {} listings, evict {} at a time, ping every {}s)",
        stream_config.endpoint,
        stream_config.limits.capacity,
        stream_config.limits.capacity - stream_config.limits.floor,
        stream_config.ping_interval.as_secs()
    );

    let presence = Presence::new(config.foreground.unwrap_or(true));
    let sink = Arc::new(TerminalSink::new(true));
    let session = ListingSession::start(stream_config, sink.clone(), presence.clone())?;

    let board = session.subscribe(BoardPrinter::new(config.board_rows.unwrap_or(10)));

    #[cfg(unix)]
    let presence_task = tokio::spawn(toggle_presence_on_usr1(presence));

    wait_for_shutdown().await;

    #[cfg(unix)]
    presence_task.abort();

    session.unsubscribe(board);
    let stats = Arc::clone(session.stats());
    session.shutdown().await;

    log::info!(
        "Shutdown complete. last status=\"{}\" connections={} frames={} rejected={} new listings={}",
        sink.last_status(),
        stats.connections(),
        stats.frames(),
        stats.rejected(),
        stats.added()
    );
    Ok(())
}

async fn wait_for_shutdown() {
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut term_signal) => {
                        term_signal.recv().await;
                        log::info!("SIGTERM received, initiating shutdown.");
                    }
                    Err(e) => {
                        log::warn!("Cannot listen for SIGTERM: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }
}

/// SIGUSR1 flips between "watching" (cue) and "away" (notification).
#[cfg(unix)]
async fn toggle_presence_on_usr1(presence: Presence) {
    let mut usr1 = match signal::unix::signal(signal::unix::SignalKind::user_defined1()) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("Presence toggle unavailable: {}", e);
            return;
        }
    };
    while usr1.recv().await.is_some() {
        let foreground = presence.toggle();
        log::info!("Presence: {}", if foreground { "watching" } else { "away" });
    }
}
