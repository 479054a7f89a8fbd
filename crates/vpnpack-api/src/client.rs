// Control API HTTP client
//
// Wraps `reqwest::Client` with the manager's URL layout, CSRF token
// rotation, per-call deadlines, and the one-shot re-authentication retry.
// Endpoint methods live in `endpoints/` as inherent impls so this module
// stays focused on transport mechanics.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Path prefix of every control API route.
pub const API_PREFIX: &str = "/vpn-pack/api";

/// Header carrying the anti-forgery token, both directions.
pub const CSRF_HEADER: &str = "X-Csrf-Token";

/// Deadline applied to calls that don't ask for their own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) const STATUS_PATH: &str = "status";

const ERROR_PREVIEW_CHARS: usize = 200;

/// Keepalive only fires once the session has been idle this long,
/// as a fraction of the keepalive interval.
const KEEPALIVE_IDLE_FRACTION: f64 = 0.8;

/// Receives human-readable failure messages from the gateway.
///
/// The status store's error log implements this so gateway failures and
/// stream failures land in the same list.
pub trait ErrorSink: Send + Sync {
    fn report(&self, message: String);
}

/// Whether the manager still accepts this client's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    /// Token refresh failed; the embedding UI should restart its login flow.
    Expired,
}

/// Request gateway for the vpn-pack manager control API.
///
/// Calls made through [`call`](Self::call) and the endpoint helpers never
/// fail outward: errors are reported to the [`ErrorSink`] and the call
/// resolves to `None`. Use [`request`](Self::request) when the typed error
/// is needed.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    default_timeout: Duration,
    /// Captured from any response carrying the header; replayed on
    /// POST/PUT/PATCH/DELETE.
    csrf_token: RwLock<Option<String>>,
    last_success: Mutex<Option<Instant>>,
    session: watch::Sender<SessionState>,
    errors: Arc<dyn ErrorSink>,
}

impl ApiClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// The `base_url` is the device root (e.g. `https://192.168.1.1`); the
    /// `/vpn-pack/api` prefix is added per request.
    pub fn new(
        base_url: Url,
        transport: &TransportConfig,
        errors: Arc<dyn ErrorSink>,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, errors))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, errors: Arc<dyn ErrorSink>) -> Self {
        let (session, _) = watch::channel(SessionState::Active);
        Self {
            http,
            base_url,
            default_timeout: DEFAULT_TIMEOUT,
            csrf_token: RwLock::new(None),
            last_success: Mutex::new(None),
            session,
            errors,
        }
    }

    /// Override the deadline used when a call doesn't specify one.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// The underlying HTTP client (shared with the event stream).
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Subscribe to session validity changes.
    pub fn session_state(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    /// When the last call succeeded, if any has.
    pub fn last_success(&self) -> Option<Instant> {
        *self
            .last_success
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Full URL for an API path: `{base}/vpn-pack/api/{path}`.
    pub fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{base}{API_PREFIX}/{path}")).map_err(Error::InvalidUrl)
    }

    // ── CSRF token management ─────────────────────────────────────────

    /// The token that will be sent on the next mutating request.
    pub fn csrf_token(&self) -> Option<String> {
        self.csrf_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update_csrf_from_response(&self, headers: &HeaderMap) {
        let Some(token) = headers
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
        else {
            return;
        };

        let mut guard = self
            .csrf_token
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.as_deref() != Some(token) {
            trace!("CSRF token rotated");
            *guard = Some(token.to_owned());
        }
    }

    fn apply_csrf(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.csrf_token() {
            Some(token) => builder.header(CSRF_HEADER, token),
            None => builder,
        }
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Perform a call, reporting failures and resolving to `None` on any
    /// error. Session expiry is signalled through
    /// [`session_state`](Self::session_state) instead of the error sink.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        timeout: Option<Duration>,
    ) -> Option<Value> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        match self.request(method, path, body, timeout).await {
            Ok(data) => Some(data),
            Err(Error::SessionExpired) => None,
            Err(e) => {
                warn!(error = %e, path, "API call failed");
                self.errors.report(e.to_string());
                None
            }
        }
    }

    /// Perform a call with the one-shot re-authentication retry.
    ///
    /// On 401/403 a single status read refreshes the CSRF token and the
    /// original call is retried once. A failed refresh or a second
    /// unauthorized answer expires the session.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value, Error> {
        match self.send_once(method.clone(), path, body, timeout).await {
            Err(Error::Unauthorized { status }) => {
                debug!(status, path, "unauthorized, refreshing credential token");
                if let Err(e) = self
                    .send_once(Method::GET, STATUS_PATH, None, timeout)
                    .await
                {
                    warn!(error = %e, "token refresh failed");
                    return Err(self.expire_session());
                }
                match self.send_once(method, path, body, timeout).await {
                    Err(Error::Unauthorized { .. }) => Err(self.expire_session()),
                    other => other,
                }
            }
            other => other,
        }
    }

    pub(crate) async fn get(&self, path: &str) -> Option<Value> {
        self.call(Method::GET, path, None, None).await
    }

    pub(crate) async fn post(&self, path: &str, body: Option<&Value>) -> Option<Value> {
        self.call(Method::POST, path, body, None).await
    }

    pub(crate) async fn patch(&self, path: &str, body: &Value) -> Option<Value> {
        self.call(Method::PATCH, path, Some(body), None).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Option<Value> {
        self.call(Method::DELETE, path, None, None).await
    }

    /// Serialize a request body, reporting failures like any other call error.
    pub(crate) fn encode(&self, body: &impl Serialize) -> Option<Value> {
        match serde_json::to_value(body) {
            Ok(value) => Some(value),
            Err(e) => {
                self.errors
                    .report(format!("Failed to encode request body: {e}"));
                None
            }
        }
    }

    /// Send a status read if the session has been idle for more than 80%
    /// of `interval`. Returns whether a status read was sent.
    pub async fn keepalive(&self, interval: Duration) -> bool {
        let threshold = interval.mul_f64(KEEPALIVE_IDLE_FRACTION);
        let idle = self
            .last_success()
            .is_none_or(|last| last.elapsed() > threshold);

        if !idle {
            trace!("keepalive skipped, session recently active");
            return false;
        }

        debug!("sending keepalive");
        self.get(STATUS_PATH).await;
        true
    }

    /// One HTTP exchange: no retry, no reporting.
    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value, Error> {
        let url = self.api_url(path)?;
        debug!("{} {}", method, url);

        let mutating = is_mutating(&method);
        let mut builder = self.http.request(method, url);
        if mutating {
            builder = self.apply_csrf(builder);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let exchange = async {
            let resp = builder.send().await?;
            self.update_csrf_from_response(resp.headers());
            let status = resp.status();
            let text = resp.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        let (status, text) = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| Error::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })??;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Unauthorized {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                message: error_message(status, &text),
            });
        }

        let data = if text.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&text).map_err(|e| Error::Deserialization {
                message: format!("{e} (body preview: {:?})", preview(&text)),
                body: text.clone(),
            })?
        };

        self.mark_success();
        Ok(data)
    }

    fn mark_success(&self) {
        *self
            .last_success
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        self.session.send_if_modified(|state| {
            let was_expired = *state == SessionState::Expired;
            *state = SessionState::Active;
            was_expired
        });
    }

    fn expire_session(&self) -> Error {
        warn!("session expired, re-authentication required");
        self.session.send_replace(SessionState::Expired);
        Error::SessionExpired
    }
}

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Human-readable message for a non-2xx response body.
///
/// Accepts `{"error": "..."}` and `{"error": {"message": "..."}}`; anything
/// that isn't JSON falls back to a truncated copy of the raw body.
fn error_message(status: StatusCode, body: &str) -> String {
    let code = status.as_u16();
    if body.trim().is_empty() {
        return format!("Request failed: {code}");
    }
    match serde_json::from_str::<Value>(body) {
        Ok(data) => extract_error(&data).unwrap_or_else(|| format!("Request failed: {code}")),
        Err(_) => format!("Request failed ({code}): {}", preview(body)),
    }
}

fn extract_error(data: &Value) -> Option<String> {
    match data.get("error")? {
        Value::String(message) => Some(message.clone()),
        other => other
            .get("message")
            .and_then(Value::as_str)
            .map(String::from),
    }
}

fn preview(body: &str) -> &str {
    body.char_indices()
        .nth(ERROR_PREVIEW_CHARS)
        .map_or(body, |(end, _)| &body[..end])
}
