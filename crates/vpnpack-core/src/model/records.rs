// ── Log and notice records ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// One entry in the user-facing error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    /// Monotonic; never reused within a store.
    pub id: u64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Monotonic creation instant, used for the dedup window.
    #[serde(skip)]
    pub(crate) created: Instant,
}

/// Severity of an activity-log entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One entry in the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Latest update notice pushed by the manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub available: bool,
    pub version: String,
    pub current_version: String,
    #[serde(rename = "changelogURL")]
    pub changelog_url: String,
    /// Client-local; reset by every new notice.
    pub dismissed: bool,
}

/// Partial update notice. Absent fields leave the current value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNotice {
    pub available: Option<bool>,
    pub version: Option<String>,
    pub current_version: Option<String>,
    #[serde(rename = "changelogURL")]
    pub changelog_url: Option<String>,
}

impl UpdateInfo {
    /// Merge a notice and un-dismiss.
    pub fn merge(&mut self, notice: UpdateNotice) {
        if let Some(available) = notice.available {
            self.available = available;
        }
        if let Some(version) = notice.version {
            self.version = version;
        }
        if let Some(current) = notice.current_version {
            self.current_version = current;
        }
        if let Some(url) = notice.changelog_url {
            self.changelog_url = url;
        }
        self.dismissed = false;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_absent_fields_and_undismisses() {
        let mut info = UpdateInfo {
            version: "1.0.0".into(),
            current_version: "0.9.0".into(),
            dismissed: true,
            ..UpdateInfo::default()
        };
        let notice: UpdateNotice =
            serde_json::from_str(r#"{"available":true,"version":"1.1.0"}"#).unwrap();
        info.merge(notice);

        assert!(info.available);
        assert_eq!(info.version, "1.1.0");
        assert_eq!(info.current_version, "0.9.0");
        assert!(!info.dismissed);
    }

    #[test]
    fn log_level_renders_lowercase() {
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert_eq!(serde_json::to_value(LogLevel::Error).unwrap(), "error");
    }
}
