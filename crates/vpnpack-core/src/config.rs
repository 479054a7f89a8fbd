// ── Session configuration ──
//
// Built by the embedding application and handed to `Session` /
// `StatusStore`. Core never reads config files.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification. Gateway devices ship self-signed certificates.
    #[default]
    DangerAcceptInvalid,
}

/// Timing knobs for the status store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// How often the gateway keepalive runs while connected. `None` disables it.
    pub keepalive_interval: Option<Duration>,
    /// Delay before reconnecting after the stream closed for good.
    pub reconnect_delay: Duration,
    /// How long a changed-field set stays visible.
    pub highlight_duration: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Some(Duration::from_secs(5 * 60)),
            reconnect_delay: Duration::from_millis(3000),
            highlight_duration: Duration::from_millis(1000),
        }
    }
}

/// Everything needed to talk to one manager instance.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Device root URL (e.g. `https://192.168.1.1`).
    pub url: Url,
    pub tls: TlsVerification,
    pub connect_timeout: Duration,
    /// Deadline for calls that don't set their own.
    pub request_timeout: Duration,
    pub store: StoreConfig,
}

impl SessionConfig {
    /// Defaults for everything but the URL.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            tls: TlsVerification::default(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: vpnpack_api::DEFAULT_TIMEOUT,
            store: StoreConfig::default(),
        }
    }
}
