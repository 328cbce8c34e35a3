//! Purpose: Instance-scoped diagnostic context threaded through extraction calls.
//! Exports: `Diagnostics`, `MESSAGE_CAP`.
//! Role: Replaces ambient error-buffer/suppression globals with an explicit value.
//! Invariants: Last-message capture is capped at `MESSAGE_CAP`; overflow truncates silently.
//! Invariants: NotFound reports are dropped only when the caller opts out (default overlay).

use std::sync::Mutex;

use crate::core::error::{Error, ErrorKind};

/// Upper bound on the recorded last-error text, in bytes.
pub const MESSAGE_CAP: usize = 1024;

/// Caller-owned diagnostic state for one extraction context.
///
/// The last-message buffer sits behind a mutex so a shared instance stays
/// safe across threads; callers that want isolated trails use one instance
/// per thread or per call site.
#[derive(Debug, Default)]
pub struct Diagnostics {
    last: Mutex<Option<String>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }

    /// Record `err` as the last message and emit an error event.
    pub fn report(&self, err: &Error) {
        let text = capped(err.to_string());
        tracing::error!("{text}");
        if let Ok(mut last) = self.last.lock() {
            *last = Some(text);
        }
    }

    /// Like [`report`](Self::report), except a NotFound outcome is neither
    /// logged nor recorded when `report_missing` is false. Used only while a
    /// default-value substitution is in progress, so a missing-but-defaulted
    /// field does not read as an error.
    pub(crate) fn report_extraction(&self, err: &Error, report_missing: bool) {
        if err.kind() == ErrorKind::NotFound && !report_missing {
            return;
        }
        self.report(err);
    }

    /// Emit an informational event. Callers gate this on their verbose flag.
    pub(crate) fn info(&self, message: &str) {
        tracing::debug!("{message}");
    }

    /// The most recent recorded message, if any.
    pub fn last_message(&self) -> Option<String> {
        self.last.lock().ok().and_then(|last| last.clone())
    }
}

fn capped(mut text: String) -> String {
    if text.len() <= MESSAGE_CAP {
        return text;
    }
    let mut end = MESSAGE_CAP;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    text
}
