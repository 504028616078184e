//! Timer-gated watch for filter-mode requests written into the document.
//!
//! A browser-side helper (or anything else with access to the file) can
//! append [`FILTER_ON_SIGNAL`] or [`FILTER_OFF_SIGNAL`] to the active
//! document. The writer scans the file at most once per interval and switches
//! mode when it finds one. Scanning is best-effort: read errors simply yield
//! no request.
//!
//! Each scan only looks at bytes that appeared since the previous scan (or
//! since the writer last reshaped the file, see [`FilterSignalWatch::mark_seen`]),
//! so a signal is acted on once. An old `FILTER_ON` left in the log body never
//! re-enters filter mode after a later `FILTER_OFF` was honored.

use std::fs::File;
use std::time::{Duration, Instant};

use crate::document::{read_from, FILTER_OFF_SIGNAL, FILTER_ON_SIGNAL};

/// Most bytes inspected by one scan, counted back from the end of the file.
pub const SCAN_WINDOW: u64 = 4096;

/// Mode requested by the most recent unseen signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterRequest {
    Activate,
    Deactivate,
}

#[derive(Debug)]
pub struct FilterSignalWatch {
    interval: Duration,
    last_scan: Option<Instant>,
    /// File length up to which signals were already considered.
    seen_up_to: u64,
}

impl FilterSignalWatch {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_scan: None,
            seen_up_to: 0,
        }
    }

    /// Whether a scan at `now` would be allowed.
    pub fn is_due(&self, now: Instant) -> bool {
        self.last_scan
            .map_or(true, |last| now.duration_since(last) >= self.interval)
    }

    /// Treat everything before `len` as already inspected.
    ///
    /// The writer calls this whenever it moves or truncates the end of the
    /// file itself: after a mode switch, a reopen or a rotation.
    pub fn mark_seen(&mut self, len: u64) {
        self.seen_up_to = len;
    }

    /// Scan the unseen end of `file` if the interval has elapsed.
    pub fn poll(&mut self, file: &mut File, now: Instant) -> Option<FilterRequest> {
        if !self.is_due(now) {
            return None;
        }
        self.last_scan = Some(now);
        let len = file.metadata().ok()?.len();
        let start = self.seen_up_to.min(len).max(len.saturating_sub(SCAN_WINDOW));
        self.seen_up_to = len;
        let unseen = read_from(file, start).ok()?;
        latest_request(&String::from_utf8_lossy(&unseen))
    }
}

/// The request made by whichever signal appears last in `text`.
pub fn latest_request(text: &str) -> Option<FilterRequest> {
    let on = text.rfind(FILTER_ON_SIGNAL);
    let off = text.rfind(FILTER_OFF_SIGNAL);
    match (on, off) {
        (Some(on), Some(off)) if on > off => Some(FilterRequest::Activate),
        (Some(_), Some(_)) => Some(FilterRequest::Deactivate),
        (Some(_), None) => Some(FilterRequest::Activate),
        (None, Some(_)) => Some(FilterRequest::Deactivate),
        (None, None) => None,
    }
}
