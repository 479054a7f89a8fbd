// Tailscale control endpoints
//
// Node lifecycle (up/down/login/logout), status reads, route
// advertisement, and the firewall integration report.

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::debug;

use crate::client::{ApiClient, STATUS_PATH};
use crate::models::RoutesRequest;

impl ApiClient {
    /// Full status document.
    ///
    /// `GET status`
    pub async fn status(&self) -> Option<Value> {
        self.get(STATUS_PATH).await
    }

    /// Gateway device identification (model, firmware, capabilities).
    ///
    /// `GET device`
    pub async fn device_info(&self) -> Option<Value> {
        self.get("device").await
    }

    /// `POST tailscale/up`
    pub async fn tailscale_up(&self) -> Option<Value> {
        debug!("bringing tailscale up");
        self.post("tailscale/up", None).await
    }

    /// `POST tailscale/down`
    pub async fn tailscale_down(&self) -> Option<Value> {
        debug!("bringing tailscale down");
        self.post("tailscale/down", None).await
    }

    /// Start an interactive login. The response carries the auth URL.
    ///
    /// `POST tailscale/login`
    pub async fn tailscale_login(&self) -> Option<Value> {
        self.post("tailscale/login", None).await
    }

    /// `POST tailscale/logout`
    pub async fn tailscale_logout(&self) -> Option<Value> {
        debug!("logging out of tailnet");
        self.post("tailscale/logout", None).await
    }

    /// Join the tailnet with a pre-generated auth key.
    ///
    /// `POST tailscale/auth-key` with `{"authKey": "..."}`
    pub async fn connect_with_auth_key(&self, auth_key: &SecretString) -> Option<Value> {
        debug!("connecting with auth key");
        let body = json!({ "authKey": auth_key.expose_secret() });
        self.post("tailscale/auth-key", Some(&body)).await
    }

    /// Currently advertised routes and their approval state.
    ///
    /// `GET routes`
    pub async fn routes(&self) -> Option<Value> {
        self.get("routes").await
    }

    /// Replace the advertised routes and exit-node flag.
    ///
    /// `POST routes`
    pub async fn set_routes(&self, request: &RoutesRequest) -> Option<Value> {
        debug!(
            routes = request.routes.len(),
            exit_node = request.exit_node,
            "setting routes"
        );
        let body = self.encode(request)?;
        self.post("routes", Some(&body)).await
    }

    /// Local subnets eligible for advertisement.
    ///
    /// `GET subnets`
    pub async fn subnets(&self) -> Option<Value> {
        self.get("subnets").await
    }

    /// Firewall integration report (chain, rule presence, watcher health).
    ///
    /// `GET firewall`
    pub async fn firewall_status(&self) -> Option<Value> {
        self.get("firewall").await
    }
}
