// WireGuard site-to-site tunnel endpoints
//
// Tunnel CRUD plus the helpers the tunnel form needs: key generation,
// WAN address discovery, local subnets, and firewall zones.

use serde_json::Value;
use tracing::debug;

use super::segment;
use crate::client::ApiClient;
use crate::models::NewTunnel;

impl ApiClient {
    /// Configured tunnels, each with its live status when available.
    ///
    /// `GET wg-s2s/tunnels`
    pub async fn list_tunnels(&self) -> Option<Value> {
        self.get("wg-s2s/tunnels").await
    }

    /// `POST wg-s2s/tunnels`
    pub async fn create_tunnel(&self, tunnel: &NewTunnel) -> Option<Value> {
        debug!(name = %tunnel.name, interface = %tunnel.interface_name, "creating tunnel");
        let body = self.encode(tunnel)?;
        self.post("wg-s2s/tunnels", Some(&body)).await
    }

    /// Patch a tunnel. `updates` carries only the fields to change.
    ///
    /// `PATCH wg-s2s/tunnels/{id}`
    pub async fn update_tunnel(&self, id: &str, updates: &Value) -> Option<Value> {
        debug!(id, "updating tunnel");
        self.patch(&format!("wg-s2s/tunnels/{}", segment(id)), updates)
            .await
    }

    /// `DELETE wg-s2s/tunnels/{id}`
    pub async fn delete_tunnel(&self, id: &str) -> Option<Value> {
        debug!(id, "deleting tunnel");
        self.delete(&format!("wg-s2s/tunnels/{}", segment(id)))
            .await
    }

    /// `POST wg-s2s/tunnels/{id}/enable`
    pub async fn enable_tunnel(&self, id: &str) -> Option<Value> {
        self.post(&format!("wg-s2s/tunnels/{}/enable", segment(id)), None)
            .await
    }

    /// `POST wg-s2s/tunnels/{id}/disable`
    pub async fn disable_tunnel(&self, id: &str) -> Option<Value> {
        self.post(&format!("wg-s2s/tunnels/{}/disable", segment(id)), None)
            .await
    }

    /// Generate a fresh key pair on the device.
    ///
    /// `POST wg-s2s/generate-keypair`
    pub async fn generate_keypair(&self) -> Option<Value> {
        self.post("wg-s2s/generate-keypair", None).await
    }

    /// Peer-side configuration for a tunnel.
    ///
    /// `GET wg-s2s/tunnels/{id}/config`
    pub async fn tunnel_config(&self, id: &str) -> Option<Value> {
        self.get(&format!("wg-s2s/tunnels/{}/config", segment(id)))
            .await
    }

    /// `GET wg-s2s/wan-ip`
    pub async fn wan_ip(&self) -> Option<Value> {
        self.get("wg-s2s/wan-ip").await
    }

    /// `GET wg-s2s/local-subnets`
    pub async fn local_subnets(&self) -> Option<Value> {
        self.get("wg-s2s/local-subnets").await
    }

    /// Firewall zones a tunnel interface can be assigned to.
    ///
    /// `GET wg-s2s/zones`
    pub async fn zones(&self) -> Option<Value> {
        self.get("wg-s2s/zones").await
    }
}
