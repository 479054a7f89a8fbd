// vpnpack-api: Async Rust client for the vpn-pack manager control API and its event stream

pub mod client;
mod endpoints;
pub mod error;
pub mod models;
pub mod sse;
pub mod transport;

pub use client::{API_PREFIX, ApiClient, CSRF_HEADER, DEFAULT_TIMEOUT, ErrorSink, SessionState};
pub use error::Error;
pub use models::{NewTunnel, RoutesRequest, SettingsUpdate};
pub use sse::{
    ReadyState, SseConnector, SseDecoder, SseEvent, StreamConnector, StreamEvent,
    StreamSubscription,
};
pub use transport::{TlsMode, TransportConfig};
