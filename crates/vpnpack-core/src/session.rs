// ── Session facade ──
//
// Wires one request gateway, one event-stream connector and one status
// store around a shared error log. Built once per manager instance.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;
use vpnpack_api::transport::{TlsMode, TransportConfig};
use vpnpack_api::{ApiClient, ErrorSink, SessionState, SseConnector, StreamConnector};

use crate::config::{SessionConfig, TlsVerification};
use crate::error::CoreError;
use crate::keepalive::Keepalive;
use crate::store::{ErrorLog, StatusStore};

/// A connection to one vpn-pack manager.
///
/// Cheaply cloneable; every clone shares the gateway, the store and the
/// error log.
#[derive(Clone)]
pub struct Session {
    api: Arc<ApiClient>,
    store: StatusStore,
}

impl Session {
    /// Build the gateway, connector and store. Nothing is connected yet;
    /// call [`connect`](Self::connect) to start the push stream.
    pub fn new(config: SessionConfig) -> Result<Self, CoreError> {
        let errors = Arc::new(ErrorLog::new());
        let transport = build_transport(&config);

        let sink: Arc<dyn ErrorSink> = errors.clone();
        let api = Arc::new(
            ApiClient::new(config.url.clone(), &transport, sink)?
                .with_default_timeout(config.request_timeout),
        );

        let connector: Arc<dyn StreamConnector> = Arc::new(SseConnector::for_client(&api)?);
        let keepalive: Arc<dyn Keepalive> = api.clone();
        let store = StatusStore::new(config.store, connector, errors, Some(keepalive));

        debug!(url = %config.url, "session created");
        Ok(Self { api, store })
    }

    /// The request gateway.
    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    /// Start (or restart) the push stream.
    pub fn connect(&self) {
        self.store.connect();
    }

    pub fn disconnect(&self) {
        self.store.disconnect();
    }

    /// Read the full status over request/response and apply it to the
    /// store. Returns whether a status document was obtained; failures are
    /// already in the error log.
    pub async fn refresh_status(&self) -> bool {
        match self.api.status().await {
            Some(status) => {
                self.store.apply_status(status);
                true
            }
            None => false,
        }
    }

    /// Subscribe to session validity. Flips to `Expired` when the manager
    /// keeps rejecting the session after a token refresh.
    pub fn session_state(&self) -> watch::Receiver<SessionState> {
        self.api.session_state()
    }
}

fn build_transport(config: &SessionConfig) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&config.tls),
        connect_timeout: config.connect_timeout,
        cookie_jar: None,
    }
    .with_cookie_jar()
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn tls_modes_map_one_to_one() {
        assert!(matches!(
            tls_to_transport(&TlsVerification::SystemDefaults),
            TlsMode::System
        ));
        assert!(matches!(
            tls_to_transport(&TlsVerification::DangerAcceptInvalid),
            TlsMode::DangerAcceptInvalid
        ));
        let path = PathBuf::from("/etc/ca.pem");
        assert!(matches!(
            tls_to_transport(&TlsVerification::CustomCa(path.clone())),
            TlsMode::CustomCa(p) if p == path
        ));
    }

    #[test]
    fn transport_always_carries_a_cookie_jar() {
        let config = SessionConfig::new("https://192.168.1.1".parse().unwrap());
        assert!(build_transport(&config).cookie_jar.is_some());
    }

    #[test]
    fn missing_ca_file_fails_construction() {
        let mut config = SessionConfig::new("https://192.168.1.1".parse().unwrap());
        config.tls = TlsVerification::CustomCa(PathBuf::from("/nonexistent/ca.pem"));
        let result = Session::new(config);
        assert!(matches!(result, Err(CoreError::ConnectionFailed { .. })));
    }

    #[tokio::test]
    async fn new_session_starts_disconnected() {
        let session = Session::new(SessionConfig::new("https://192.168.1.1".parse().unwrap()))
            .unwrap();
        assert!(!session.store().status().connected);
        assert_eq!(*session.session_state().borrow(), SessionState::Active);
        assert_eq!(
            session.api().base_url().as_str(),
            "https://192.168.1.1/"
        );
    }
}
