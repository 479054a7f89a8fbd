// ── Core error types ──
//
// The running store never fails outward; these cover session setup.
// The `From<vpnpack_api::Error>` impl folds transport-layer errors into
// domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to manager at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<vpnpack_api::Error> for CoreError {
    fn from(err: vpnpack_api::Error) -> Self {
        use vpnpack_api::Error as ApiError;

        match err {
            ApiError::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ApiError::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            ApiError::Transport(ref e) => CoreError::ConnectionFailed {
                url: e.url().map(ToString::to_string).unwrap_or_default(),
                reason: e.to_string(),
            },
            other => CoreError::ConnectionFailed {
                url: String::new(),
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_map_to_domain_variants() {
        let err: CoreError = vpnpack_api::Error::Tls("bad cert".into()).into();
        assert!(matches!(err, CoreError::ConnectionFailed { ref reason, .. } if reason == "TLS error: bad cert"));

        let err: CoreError = vpnpack_api::Error::InvalidUrl(url::ParseError::EmptyHost).into();
        assert!(matches!(err, CoreError::Config { ref message } if message.starts_with("Invalid URL")));

        let err: CoreError = vpnpack_api::Error::SessionExpired.into();
        assert!(matches!(err, CoreError::ConnectionFailed { .. }));
    }
}
