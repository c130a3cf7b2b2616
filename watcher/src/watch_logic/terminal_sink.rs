use std::sync::{Mutex, PoisonError};

use actually_beep::beep_with_hz_and_millis;
use colored::Colorize;
use lib_listings::AlertSink;

/// Alert sink for an interactive terminal: a short beep while watched, a
/// highlighted line otherwise, and the status line in the log.
pub struct TerminalSink {
    audible: bool,
    last_status: Mutex<String>,
}

impl TerminalSink {
    pub fn new(audible: bool) -> Self {
        Self {
            audible,
            last_status: Mutex::new(String::new()),
        }
    }

    pub fn last_status(&self) -> String {
        self.last_status.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl AlertSink for TerminalSink {
    fn play_cue(&self) {
        if !self.audible {
            log::debug!("Cue (muted)");
            return;
        }
        // Audio output blocks for the length of the tone.
        let spawned = std::thread::Builder::new()
            .name("cue".into())
            .spawn(|| {
                // A4, short enough not to overlap back-to-back batches.
                if let Err(e) = beep_with_hz_and_millis(440, 150) {
                    log::debug!("Beep unavailable: {:?}", e);
                }
            });
        if let Err(e) = spawned {
            log::debug!("Could not start cue thread: {}", e);
        }
    }

    fn notify_new_listings(&self, count: usize) {
        let text = format!(" {} new listing(s) found ", count);
        println!("{}", text.black().on_yellow().bold());
    }

    fn update_status(&self, text: &str) {
        let mut last = self.last_status.lock().unwrap_or_else(PoisonError::into_inner);
        if *last == text {
            return;
        }
        log::info!("Status: {}", text);
        *last = text.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_updates_are_idempotent() {
        let sink = TerminalSink::new(false);
        sink.update_status("connected");
        sink.update_status("connected");
        assert_eq!(sink.last_status(), "connected");
        sink.update_status("connected (2 new)");
        assert_eq!(sink.last_status(), "connected (2 new)");
    }

    #[test]
    fn muted_cue_is_a_no_op() {
        TerminalSink::new(false).play_cue();
    }
}
