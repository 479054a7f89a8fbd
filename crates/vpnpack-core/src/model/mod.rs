// ── Domain model ──
//
// Snapshot of remote state plus the store's own log records.

mod records;
mod status;

use serde::{Deserialize, Deserializer};

pub use records::{ErrorRecord, LogLevel, LogRecord, UpdateInfo, UpdateNotice};
pub use status::{
    DerpRegion, FirewallHealth, IntegrationStatus, PeerInfo, RouteStatus, SelfNode,
    StatusField, StatusSnapshot, TunnelStatus, UNKNOWN_BACKEND_STATE,
};

/// Patch field for a non-nullable value: absent stays `None`, an explicit
/// `null` resets to the default.
///
/// Used with `#[serde(default, deserialize_with = "...")]`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Some(Option::<T>::deserialize(deserializer)?.unwrap_or_default()))
}

/// Patch field for a nullable value: absent stays `None`, an explicit
/// `null` becomes `Some(None)`.
pub(crate) fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
