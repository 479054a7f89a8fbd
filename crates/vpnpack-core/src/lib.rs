//! Live status layer between `vpnpack-api` and UI consumers.
//!
//! - **[`Session`]**: Facade wiring the request gateway, the event-stream
//!   connector and the status store around one shared error log.
//!
//! - **[`StatusStore`]**: Process-wide mirror of the manager's state. Feeds
//!   on the push stream, reconciles partial updates field by field, tracks
//!   which fields just changed, and reconnects after the stream closes.
//!
//! - **[`StoreSubscription<T>`]**: Subscription handle vended by the store.
//!   Exposes `current()` / `latest()` / `changed()` for reactive rendering.
//!
//! - **[`ConnectionMachine`]**: Pure reducer for the stream lifecycle; the
//!   store executes the effects it returns.

pub mod config;
pub mod error;
pub mod keepalive;
pub mod machine;
pub mod model;
pub mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{SessionConfig, StoreConfig, TlsVerification};
pub use error::CoreError;
pub use keepalive::Keepalive;
pub use machine::{ConnectionMachine, Effect, MachineEvent, Phase};
pub use session::Session;
pub use store::{ChangedFields, ErrorLog, SnapshotPatch, StatusStore};
pub use stream::StoreSubscription;

pub use model::{
    ErrorRecord, LogLevel, LogRecord, StatusField, StatusSnapshot, UpdateInfo, UpdateNotice,
};
