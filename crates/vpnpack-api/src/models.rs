// Request bodies for the control API
//
// Responses are returned as loosely-typed JSON; the status store owns the
// typed view of the status document. Only the write side is typed here.

use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, Serializer};

/// `POST routes` body: advertised subnets plus the exit-node flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutesRequest {
    pub routes: Vec<String>,
    pub exit_node: bool,
}

/// `POST settings` body. Absent fields are left unchanged on the device.
///
/// `relay_server_port` distinguishes "leave alone" (`None`) from "disable
/// the relay server" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(rename = "acceptDNS", skip_serializing_if = "Option::is_none")]
    pub accept_dns: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_routes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shields_up: Option<bool>,
    #[serde(rename = "runSSH", skip_serializing_if = "Option::is_none")]
    pub run_ssh: Option<bool>,
    #[serde(rename = "controlURL", skip_serializing_if = "Option::is_none")]
    pub control_url: Option<String>,
    #[serde(rename = "noSNAT", skip_serializing_if = "Option::is_none")]
    pub no_snat: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub udp_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_server_port: Option<Option<u16>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_server_endpoints: Option<String>,
}

/// `POST wg-s2s/tunnels` body.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTunnel {
    pub name: String,
    pub interface_name: String,
    pub listen_port: u16,
    pub tunnel_address: String,
    pub peer_public_key: String,
    pub peer_endpoint: String,
    #[serde(rename = "allowedIPs")]
    pub allowed_ips: Vec<String>,
    pub persistent_keepalive: u32,
    pub mtu: u32,
    pub enabled: bool,
    /// Supply an existing private key; the device generates one when absent.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "expose_optional"
    )]
    pub private_key: Option<SecretString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_name: Option<String>,
}

#[allow(clippy::ref_option)]
fn expose_optional<S: Serializer>(
    secret: &Option<SecretString>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(secret) => serializer.serialize_str(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}
