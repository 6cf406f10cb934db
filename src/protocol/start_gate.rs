//! # Start Gate
//!
//! Discards everything the device emits before the start sentinel.

use super::record::{first_field, START_SENTINEL};

/// Two-state filter in front of the sample pipeline.
///
/// Boot chatter and handshake echo preceding the sentinel are noise by
/// contract, not samples. The gate latches on the first batch whose leading
/// record carries the sentinel in field 0 and stays open for the rest of
/// the session; only a session reset re-arms it.
#[derive(Debug, Default)]
pub struct StartGate {
    started: bool,
}

impl StartGate {
    pub fn new() -> Self {
        Self { started: false }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Filter one batch of pending raw lines.
    ///
    /// Latched: the batch passes through untouched. Not latched: the first
    /// pending record decides. A sentinel in field 0 opens the gate and the
    /// whole batch (sentinel line included) passes; anything else discards
    /// the entire batch silently. Discarded lines are never counted or
    /// persisted.
    pub fn filter(&mut self, lines: Vec<String>) -> Vec<String> {
        if self.started {
            return lines;
        }
        match lines.first() {
            Some(first) if first_field(first) == START_SENTINEL => {
                self.started = true;
                lines
            }
            _ => Vec::new(),
        }
    }

    /// Re-arm for a fresh session (reset path)
    pub fn reset(&mut self) {
        self.started = false;
    }
}
