// ── Activity log ──
//
// Newest-first record of notable store events. Separate from tracing
// output: this is what the UI shows.

use std::collections::VecDeque;

use chrono::Utc;
use tokio::sync::watch;

use crate::model::{LogLevel, LogRecord};

/// Oldest entries are dropped beyond this.
pub const LOG_CAP: usize = 500;

#[derive(Debug)]
pub(crate) struct ActivityLog {
    entries: watch::Sender<VecDeque<LogRecord>>,
}

impl ActivityLog {
    pub(crate) fn new() -> Self {
        let (entries, _) = watch::channel(VecDeque::new());
        Self { entries }
    }

    pub(crate) fn add(&self, level: LogLevel, message: impl Into<String>) {
        let record = LogRecord {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        };
        self.entries.send_modify(|entries| {
            entries.push_front(record);
            entries.truncate(LOG_CAP);
        });
    }

    /// Entries, newest first.
    pub(crate) fn entries(&self) -> Vec<LogRecord> {
        self.entries.borrow().iter().cloned().collect()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<VecDeque<LogRecord>> {
        self.entries.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_first_and_capped() {
        let log = ActivityLog::new();
        for i in 0..510 {
            log.add(LogLevel::Info, format!("line {i}"));
        }
        let entries = log.entries();
        assert_eq!(entries.len(), LOG_CAP);
        assert_eq!(entries[0].message, "line 509");
        assert_eq!(entries[LOG_CAP - 1].message, "line 10");
    }
}
