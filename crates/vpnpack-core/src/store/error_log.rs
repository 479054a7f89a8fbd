// ── Error log ──
//
// Shared between the request gateway (as its `ErrorSink`) and the status
// store, so gateway failures and stream failures land in one list.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;
use vpnpack_api::ErrorSink;

use crate::model::ErrorRecord;

/// Oldest entries are dropped beyond this.
pub const ERROR_CAP: usize = 50;

/// A message identical to an entry younger than this is suppressed.
pub const ERROR_DEDUP_WINDOW: Duration = Duration::from_millis(5000);

/// Append-only, capped, deduplicating error list.
#[derive(Debug)]
pub struct ErrorLog {
    entries: watch::Sender<Vec<ErrorRecord>>,
    next_id: AtomicU64,
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorLog {
    pub fn new() -> Self {
        let (entries, _) = watch::channel(Vec::new());
        Self {
            entries,
            next_id: AtomicU64::new(0),
        }
    }

    /// Append `message` unless an identical one was logged within the
    /// dedup window. Returns the new entry's id.
    pub fn add(&self, message: impl Into<String>) -> Option<u64> {
        let message = message.into();
        let now = Instant::now();
        let mut added = None;

        self.entries.send_if_modified(|entries| {
            let duplicate = entries.iter().any(|e| {
                e.message == message && now.duration_since(e.created) < ERROR_DEDUP_WINDOW
            });
            if duplicate {
                debug!(error = %message, "suppressing duplicate error");
                return false;
            }

            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            entries.push(ErrorRecord {
                id,
                message: message.clone(),
                timestamp: Utc::now(),
                created: now,
            });
            if entries.len() > ERROR_CAP {
                let excess = entries.len() - ERROR_CAP;
                entries.drain(..excess);
            }
            added = Some(id);
            true
        });

        added
    }

    /// Remove the entry with `id`. Returns whether one was removed.
    pub fn dismiss(&self, id: u64) -> bool {
        self.entries.send_if_modified(|entries| {
            let before = entries.len();
            entries.retain(|e| e.id != id);
            entries.len() != before
        })
    }

    /// Whether an entry with `id` is still present.
    pub fn contains(&self, id: u64) -> bool {
        self.entries.borrow().iter().any(|e| e.id == id)
    }

    /// Id of the newest entry carrying `message`, if any.
    pub fn find(&self, message: &str) -> Option<u64> {
        self.entries
            .borrow()
            .iter()
            .rev()
            .find(|e| e.message == message)
            .map(|e| e.id)
    }

    /// Current entries, oldest first.
    pub fn entries(&self) -> Vec<ErrorRecord> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<ErrorRecord>> {
        self.entries.subscribe()
    }
}

impl ErrorSink for ErrorLog {
    fn report(&self, message: String) {
        self.add(message);
    }
}
