// ── Status snapshot ──
//
// Typed mirror of the manager's status document. Wire names follow the
// server (camelCase with a few all-caps acronyms). Nested records keep
// unrecognised server fields in `extra` so structural comparison sees
// every change the server makes.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Backend state reported before the first status arrives.
pub const UNKNOWN_BACKEND_STATE: &str = "Unknown";

/// Live mirror of remote device state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusSnapshot {
    // ── Connection / backend ──
    pub backend_state: String,
    /// Client-local: whether the push stream is currently open.
    pub connected: bool,
    #[serde(rename = "authURL")]
    pub auth_url: String,
    #[serde(rename = "controlURL")]
    pub control_url: String,
    pub version: String,
    pub tailnet_name: String,

    // ── Identity ──
    #[serde(rename = "tailscaleIPs")]
    pub tailscale_ips: Vec<String>,
    #[serde(rename = "self")]
    pub self_node: Option<SelfNode>,

    // ── Peers and routing ──
    pub peers: Vec<PeerInfo>,
    pub routes: Vec<RouteStatus>,
    pub exit_node: bool,
    pub derp: Vec<DerpRegion>,

    // ── Health ──
    pub health: Vec<String>,
    pub firewall_health: Option<FirewallHealth>,
    pub integration_status: Option<IntegrationStatus>,
    pub dpi_fingerprinting: Option<bool>,

    // ── Site-to-site tunnels ──
    #[serde(rename = "wgS2sTunnels")]
    pub wg_s2s_tunnels: Vec<TunnelStatus>,

    // ── Local settings ──
    pub hostname: String,
    #[serde(rename = "acceptDNS")]
    pub accept_dns: bool,
    pub accept_routes: bool,
    pub shields_up: bool,
    #[serde(rename = "runSSH")]
    pub run_ssh: bool,
    #[serde(rename = "noSNAT")]
    pub no_snat: bool,
    pub udp_port: u16,
    pub relay_server_port: Option<u16>,
    pub relay_server_endpoints: String,
    pub advertise_tags: Vec<String>,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            backend_state: UNKNOWN_BACKEND_STATE.to_owned(),
            connected: false,
            auth_url: String::new(),
            control_url: String::new(),
            version: String::new(),
            tailnet_name: String::new(),
            tailscale_ips: Vec::new(),
            self_node: None,
            peers: Vec::new(),
            routes: Vec::new(),
            exit_node: false,
            derp: Vec::new(),
            health: Vec::new(),
            firewall_health: None,
            integration_status: None,
            dpi_fingerprinting: None,
            wg_s2s_tunnels: Vec::new(),
            hostname: String::new(),
            accept_dns: false,
            accept_routes: false,
            shields_up: false,
            run_ssh: false,
            no_snat: false,
            udp_port: 0,
            relay_server_port: None,
            relay_server_endpoints: String::new(),
            advertise_tags: Vec::new(),
        }
    }
}

// ── Nested records ───────────────────────────────────────────────────

/// This node as seen by the tailnet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelfNode {
    pub host_name: String,
    pub dns_name: String,
    pub online: bool,
    pub tx_bytes: i64,
    pub rx_bytes: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeerInfo {
    pub host_name: String,
    pub dns_name: String,
    #[serde(rename = "tailscaleIP")]
    pub tailscale_ip: String,
    pub os: String,
    pub online: bool,
    /// RFC 3339, as sent.
    pub last_seen: String,
    pub cur_addr: String,
    pub relay: String,
    pub peer_relay: String,
    pub rx_bytes: i64,
    pub tx_bytes: i64,
    pub active: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An advertised subnet and whether the control plane approved it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteStatus {
    pub cidr: String,
    pub approved: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One relay region and its measured latency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DerpRegion {
    #[serde(rename = "regionID")]
    pub region_id: i64,
    pub region_code: String,
    pub region_name: String,
    pub latency_ms: f64,
    pub preferred: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirewallHealth {
    pub zone_active: bool,
    pub watcher_running: bool,
    pub udapi_reachable: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Controller integration API key state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntegrationStatus {
    pub configured: bool,
    pub valid: bool,
    pub site_id: Option<String>,
    pub app_version: Option<String>,
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Live state of a WireGuard site-to-site tunnel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TunnelStatus {
    pub id: String,
    pub name: String,
    pub interface_name: String,
    pub enabled: bool,
    pub connected: bool,
    pub last_handshake: String,
    pub transfer_rx: i64,
    pub transfer_tx: i64,
    pub endpoint: String,
    pub listen_port: u16,
    pub local_address: String,
    #[serde(deserialize_with = "null_as_vec")]
    pub remote_subnets: Vec<String>,
    #[serde(rename = "forwardINOk")]
    pub forward_in_ok: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

// ── StatusField ──────────────────────────────────────────────────────

/// Top-level snapshot fields, named as on the wire.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::AsRefStr,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "camelCase")]
pub enum StatusField {
    BackendState,
    Connected,
    #[strum(serialize = "authURL")]
    AuthUrl,
    #[strum(serialize = "controlURL")]
    ControlUrl,
    Version,
    TailnetName,
    #[strum(serialize = "tailscaleIPs")]
    TailscaleIps,
    #[strum(serialize = "self")]
    SelfNode,
    Peers,
    Routes,
    ExitNode,
    Derp,
    Health,
    FirewallHealth,
    IntegrationStatus,
    DpiFingerprinting,
    #[strum(serialize = "wgS2sTunnels")]
    WgS2sTunnels,
    Hostname,
    #[strum(serialize = "acceptDNS")]
    AcceptDns,
    AcceptRoutes,
    ShieldsUp,
    #[strum(serialize = "runSSH")]
    RunSsh,
    #[strum(serialize = "noSNAT")]
    NoSnat,
    UdpPort,
    RelayServerPort,
    RelayServerEndpoints,
    AdvertiseTags,
}

impl Serialize for StatusField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_ref())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn default_snapshot_is_unknown_and_disconnected() {
        let snapshot = StatusSnapshot::default();
        assert_eq!(snapshot.backend_state, "Unknown");
        assert!(!snapshot.connected);
        assert!(snapshot.self_node.is_none());
    }

    #[test]
    fn field_names_match_snapshot_wire_names() {
        let value = serde_json::to_value(StatusSnapshot::default()).unwrap();
        let object = value.as_object().unwrap();
        for field in StatusField::iter() {
            assert!(
                object.contains_key(field.as_ref()),
                "{field} missing from serialized snapshot"
            );
        }
        assert_eq!(object.len(), StatusField::iter().count());
    }

    #[test]
    fn field_names_parse_back() {
        assert_eq!(
            StatusField::from_str("tailscaleIPs").unwrap(),
            StatusField::TailscaleIps
        );
        assert_eq!(StatusField::SelfNode.to_string(), "self");
        assert_eq!(StatusField::WgS2sTunnels.as_ref(), "wgS2sTunnels");
    }

    #[test]
    fn nested_records_keep_unknown_fields() {
        let peer: PeerInfo = serde_json::from_value(json!({
            "hostName": "nas",
            "online": true,
            "keyExpiry": "2027-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(peer.host_name, "nas");
        assert_eq!(peer.extra["keyExpiry"], "2027-01-01T00:00:00Z");

        let roundtrip = serde_json::to_value(&peer).unwrap();
        assert_eq!(roundtrip["keyExpiry"], "2027-01-01T00:00:00Z");
    }

    #[test]
    fn tunnel_tolerates_null_subnets() {
        let tunnel: TunnelStatus = serde_json::from_value(json!({
            "id": "t1",
            "remoteSubnets": null,
            "forwardINOk": true
        }))
        .unwrap();
        assert!(tunnel.remote_subnets.is_empty());
        assert!(tunnel.forward_in_ok);
    }
}
