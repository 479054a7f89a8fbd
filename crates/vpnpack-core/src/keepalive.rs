// ── Session keepalive ──

use std::time::Duration;

use async_trait::async_trait;
use vpnpack_api::ApiClient;

/// Something that can keep the remote session warm.
///
/// The status store calls this periodically while connected. Implemented
/// by [`ApiClient`], which only sends a status read when the session has been idle.
#[async_trait]
pub trait Keepalive: Send + Sync {
    /// Returns whether a status read was actually sent.
    async fn keepalive(&self, interval: Duration) -> bool;
}

#[async_trait]
impl Keepalive for ApiClient {
    async fn keepalive(&self, interval: Duration) -> bool {
        ApiClient::keepalive(self, interval).await
    }
}
