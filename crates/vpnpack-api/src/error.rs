use thiserror::Error;

/// Top-level error type for the `vpnpack-api` crate.
///
/// Covers every failure mode of the control API and its event stream.
/// The request gateway never hands these to its callers directly: it turns
/// them into error-log messages and a `None` result. They surface as values
/// only from the lower-level [`ApiClient::request`](crate::ApiClient::request)
/// and from client construction.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The manager rejected the request (HTTP 401 or 403).
    #[error("Unauthorized (HTTP {status})")]
    Unauthorized { status: u16 },

    /// Token refresh failed or the retried call was still unauthorized.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request exceeded its deadline and was abandoned.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── API ─────────────────────────────────────────────────────────
    /// Non-2xx response. `message` is already human-readable.
    #[error("{message}")]
    Http { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Event stream ────────────────────────────────────────────────
    /// The events endpoint answered with a non-200 status.
    #[error("Event stream rejected (HTTP {status})")]
    StreamRejected { status: u16 },

    /// The events endpoint answered with something other than an event stream.
    #[error("Unexpected event stream content type: {0}")]
    StreamContentType(String),
}

impl Error {
    /// Returns `true` if this error indicates the session is no longer valid.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::SessionExpired)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_body(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status }
            | Self::Http { status, .. }
            | Self::StreamRejected { status } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
