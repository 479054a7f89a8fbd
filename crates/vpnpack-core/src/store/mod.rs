// ── Status store ──
//
// Live snapshot, change highlighting, error and activity logs, and the
// push-stream lifecycle that feeds them.

mod activity_log;
mod error_log;
mod reconcile;
mod status_store;

pub use activity_log::LOG_CAP;
pub use error_log::{ERROR_CAP, ERROR_DEDUP_WINDOW, ErrorLog};
pub use reconcile::{BackendTransition, ChangeSet, ChangedFields, SnapshotPatch, reconcile};
pub use status_store::{CONNECTION_LOST_MESSAGE, StatusStore, UPDATE_EVENT};
