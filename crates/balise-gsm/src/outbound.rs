//! Outbound SMS: fixed-width chunking and `+CMGS` submission.

use std::thread;
use std::time::Duration;

use crate::channel::{AtChannel, CTRL_Z, ESC};

/// Characters per outbound segment.
pub const SEGMENT_CHARS: usize = 150;

/// Result of a multi-segment send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SendOutcome {
    /// Segments the modem accepted.
    pub sent: usize,
    pub total: usize,
}

impl SendOutcome {
    pub fn is_complete(&self) -> bool {
        self.sent == self.total
    }
}

/// Split `text` into consecutive pieces of at most [`SEGMENT_CHARS`]
/// characters. Not word-aware. Empty text yields no segment.
pub fn segments(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let cut = rest
            .char_indices()
            .nth(SEGMENT_CHARS)
            .map_or(rest.len(), |(i, _)| i);
        let (head, tail) = rest.split_at(cut);
        out.push(head);
        rest = tail;
    }
    out
}

/// Send `text` to `number`, one `+CMGS` exchange per segment, pausing
/// `segment_delay` between segments. A failed segment does not stop the
/// remaining ones.
pub fn send_text(
    ch: &mut dyn AtChannel,
    number: &str,
    text: &str,
    wait: Duration,
    segment_delay: Duration,
) -> SendOutcome {
    let parts = segments(text);
    let mut outcome = SendOutcome {
        sent: 0,
        total: parts.len(),
    };
    for (i, part) in parts.iter().enumerate() {
        match send_segment(ch, number, part, wait) {
            Ok(()) => outcome.sent += 1,
            Err(reason) => {
                tracing::warn!(number, segment = i + 1, total = outcome.total, reason = %reason, "SMS segment not sent");
            }
        }
        if i + 1 < parts.len() {
            thread::sleep(segment_delay);
        }
    }
    tracing::info!(number, sent = outcome.sent, total = outcome.total, "SMS sent");
    outcome
}

/// Once `+CMGS` is on the wire the modem may be in text-entry mode, so the
/// exchange always ends with Ctrl-Z (or ESC when no prompt came back).
/// Otherwise every later AT line would become message text.
fn send_segment(ch: &mut dyn AtChannel, number: &str, part: &str, wait: Duration) -> Result<(), String> {
    if let Err(e) = ch.send_command(&format!("+CMGS=\"{number}\""), wait) {
        if let Err(abort) = ch.send_raw(ESC, wait) {
            tracing::debug!(error = %abort, "no answer to compose abort");
        }
        return Err(e.to_string());
    }
    // With echo off the modem says nothing until the terminator.
    if let Err(e) = ch.send_raw(part, wait) {
        tracing::debug!(number, error = %e, "no echo for SMS body");
    }
    let reply = ch.send_raw(CTRL_Z, wait).map_err(|e| e.to_string())?;
    if reply.contains("ERROR") {
        return Err(reply);
    }
    Ok(())
}
