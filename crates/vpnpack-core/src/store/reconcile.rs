// ── Snapshot reconciliation ──
//
// Applies a partial status document onto the live snapshot and reports
// which top-level fields actually changed. Pure: no logging, no timers.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::model::{
    DerpRegion, FirewallHealth, IntegrationStatus, PeerInfo, RouteStatus, SelfNode, StatusField,
    StatusSnapshot, TunnelStatus, null_as_default, present,
};

/// Fields that changed in the most recent update.
pub type ChangedFields = BTreeSet<StatusField>;

/// A partial status document as pushed by the server.
///
/// `None` means the field was absent and must be left alone. Nullable
/// snapshot fields use `Option<Option<T>>` so an explicit `null` clears
/// them. A `null` backend state counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPatch {
    #[serde(default)]
    pub backend_state: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub connected: Option<bool>,
    #[serde(rename = "authURL", default, deserialize_with = "null_as_default")]
    pub auth_url: Option<String>,
    #[serde(rename = "controlURL", default, deserialize_with = "null_as_default")]
    pub control_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tailnet_name: Option<String>,
    #[serde(rename = "tailscaleIPs", default, deserialize_with = "null_as_default")]
    pub tailscale_ips: Option<Vec<String>>,
    #[serde(rename = "self", default, deserialize_with = "present")]
    pub self_node: Option<Option<SelfNode>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub peers: Option<Vec<PeerInfo>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub routes: Option<Vec<RouteStatus>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exit_node: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub derp: Option<Vec<DerpRegion>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub health: Option<Vec<String>>,
    #[serde(default, deserialize_with = "present")]
    pub firewall_health: Option<Option<FirewallHealth>>,
    #[serde(default, deserialize_with = "present")]
    pub integration_status: Option<Option<IntegrationStatus>>,
    #[serde(default, deserialize_with = "present")]
    pub dpi_fingerprinting: Option<Option<bool>>,
    #[serde(rename = "wgS2sTunnels", default, deserialize_with = "null_as_default")]
    pub wg_s2s_tunnels: Option<Vec<TunnelStatus>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hostname: Option<String>,
    #[serde(rename = "acceptDNS", default, deserialize_with = "null_as_default")]
    pub accept_dns: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub accept_routes: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub shields_up: Option<bool>,
    #[serde(rename = "runSSH", default, deserialize_with = "null_as_default")]
    pub run_ssh: Option<bool>,
    #[serde(rename = "noSNAT", default, deserialize_with = "null_as_default")]
    pub no_snat: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub udp_port: Option<u16>,
    #[serde(default, deserialize_with = "present")]
    pub relay_server_port: Option<Option<u16>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub relay_server_endpoints: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub advertise_tags: Option<Vec<String>>,
}

impl SnapshotPatch {
    /// Decode a status document. Anything but a JSON object is rejected;
    /// a repeated key keeps its last value.
    pub fn from_json(value: Value) -> serde_json::Result<Self> {
        let map: Map<String, Value> = serde_json::from_value(value)?;
        serde_json::from_value(Value::Object(map))
    }

    /// Same as [`from_json`](Self::from_json), from raw event text.
    pub fn parse(data: &str) -> serde_json::Result<Self> {
        let map: Map<String, Value> = serde_json::from_str(data)?;
        serde_json::from_value(Value::Object(map))
    }
}

/// A `backendState` change carried by an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTransition {
    pub from: String,
    pub to: String,
}

/// Outcome of one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub fields: ChangedFields,
    pub backend_transition: Option<BackendTransition>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Assign each present patch field, recording those whose value differs.
macro_rules! merge_fields {
    ($snapshot:ident, $patch:ident, $changed:ident; $($field:ident => $name:ident),+ $(,)?) => {
        $(
            if let Some(value) = $patch.$field {
                if $snapshot.$field != value {
                    $changed.insert(StatusField::$name);
                }
                $snapshot.$field = value;
            }
        )+
    };
}

/// Merge `patch` into `snapshot` in place.
///
/// Fields absent from the patch are untouched. The returned field set is
/// exactly the fields whose new value differs structurally from the old.
pub fn reconcile(snapshot: &mut StatusSnapshot, patch: SnapshotPatch) -> ChangeSet {
    let mut fields = ChangedFields::new();
    let mut backend_transition = None;

    if let Some(state) = patch.backend_state {
        if snapshot.backend_state != state {
            fields.insert(StatusField::BackendState);
            backend_transition = Some(BackendTransition {
                from: std::mem::replace(&mut snapshot.backend_state, state),
                to: snapshot.backend_state.clone(),
            });
        }
    }

    merge_fields!(snapshot, patch, fields;
        connected => Connected,
        auth_url => AuthUrl,
        control_url => ControlUrl,
        version => Version,
        tailnet_name => TailnetName,
        tailscale_ips => TailscaleIps,
        self_node => SelfNode,
        peers => Peers,
        routes => Routes,
        exit_node => ExitNode,
        derp => Derp,
        health => Health,
        firewall_health => FirewallHealth,
        integration_status => IntegrationStatus,
        dpi_fingerprinting => DpiFingerprinting,
        wg_s2s_tunnels => WgS2sTunnels,
        hostname => Hostname,
        accept_dns => AcceptDns,
        accept_routes => AcceptRoutes,
        shields_up => ShieldsUp,
        run_ssh => RunSsh,
        no_snat => NoSnat,
        udp_port => UdpPort,
        relay_server_port => RelayServerPort,
        relay_server_endpoints => RelayServerEndpoints,
        advertise_tags => AdvertiseTags,
    );

    ChangeSet {
        fields,
        backend_transition,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn patch(value: serde_json::Value) -> SnapshotPatch {
        SnapshotPatch::from_json(value).unwrap()
    }

    #[test]
    fn absent_fields_are_untouched() {
        let mut snapshot = StatusSnapshot {
            hostname: "gw".into(),
            exit_node: true,
            ..StatusSnapshot::default()
        };
        let before = snapshot.clone();

        let changes = reconcile(&mut snapshot, patch(json!({ "tailnetName": "example.ts.net" })));

        assert_eq!(changes.fields, ChangedFields::from([StatusField::TailnetName]));
        assert_eq!(snapshot.tailnet_name, "example.ts.net");
        assert_eq!(
            StatusSnapshot {
                tailnet_name: before.tailnet_name.clone(),
                ..snapshot.clone()
            },
            before
        );
    }

    #[test]
    fn equal_values_are_not_changes() {
        let mut snapshot = StatusSnapshot::default();
        reconcile(
            &mut snapshot,
            patch(json!({ "routes": [{ "cidr": "10.0.0.0/24", "approved": true }] })),
        );

        let changes = reconcile(
            &mut snapshot,
            patch(json!({
                "routes": [{ "cidr": "10.0.0.0/24", "approved": true }],
                "exitNode": false,
                "backendState": "Unknown"
            })),
        );
        assert!(changes.is_empty());
        assert!(changes.backend_transition.is_none());
    }

    #[test]
    fn deep_differences_are_detected() {
        let mut snapshot = StatusSnapshot::default();
        reconcile(
            &mut snapshot,
            patch(json!({ "peers": [{ "hostName": "nas", "online": true, "rxBytes": 10 }] })),
        );

        let changes = reconcile(
            &mut snapshot,
            patch(json!({ "peers": [{ "hostName": "nas", "online": true, "rxBytes": 11 }] })),
        );
        assert_eq!(changes.fields, ChangedFields::from([StatusField::Peers]));
        assert_eq!(snapshot.peers[0].rx_bytes, 11);
    }

    #[test]
    fn backend_transition_reports_old_and_new() {
        let mut snapshot = StatusSnapshot::default();
        let changes = reconcile(&mut snapshot, patch(json!({ "backendState": "NeedsLogin" })));

        assert_eq!(
            changes.backend_transition,
            Some(BackendTransition {
                from: "Unknown".into(),
                to: "NeedsLogin".into(),
            })
        );
        assert_eq!(snapshot.backend_state, "NeedsLogin");
    }

    #[test]
    fn explicit_null_clears_nullable_fields() {
        let mut snapshot = StatusSnapshot::default();
        reconcile(
            &mut snapshot,
            patch(json!({
                "firewallHealth": { "zoneActive": true, "watcherRunning": true, "udapiReachable": true },
                "relayServerPort": 40000
            })),
        );
        assert!(snapshot.firewall_health.is_some());

        let changes = reconcile(
            &mut snapshot,
            patch(json!({ "firewallHealth": null, "relayServerPort": null })),
        );
        assert_eq!(
            changes.fields,
            ChangedFields::from([StatusField::FirewallHealth, StatusField::RelayServerPort])
        );
        assert!(snapshot.firewall_health.is_none());
        assert!(snapshot.relay_server_port.is_none());
    }

    #[test]
    fn null_list_resets_to_empty() {
        let mut snapshot = StatusSnapshot {
            tailscale_ips: vec!["100.64.0.1".into()],
            ..StatusSnapshot::default()
        };
        let changes = reconcile(&mut snapshot, patch(json!({ "tailscaleIPs": null })));
        assert_eq!(changes.fields, ChangedFields::from([StatusField::TailscaleIps]));
        assert!(snapshot.tailscale_ips.is_empty());
    }

    #[test]
    fn unknown_top_level_keys_are_ignored() {
        let parsed = patch(json!({ "somethingNew": 1, "version": "1.80.0" }));
        assert_eq!(parsed.version.as_deref(), Some("1.80.0"));
    }

    #[test]
    fn wrong_types_fail_to_parse() {
        let result = SnapshotPatch::from_json(json!({ "backendState": 5 }));
        assert!(result.is_err());
    }

    #[test]
    fn only_objects_are_status_documents() {
        assert!(SnapshotPatch::from_json(json!(["NeedsLogin", true])).is_err());
        assert!(SnapshotPatch::from_json(json!(null)).is_err());
        assert!(SnapshotPatch::parse(r#"["NeedsLogin", true]"#).is_err());
        assert!(SnapshotPatch::parse("null").is_err());
    }

    #[test]
    fn repeated_key_keeps_last_value() {
        let parsed = SnapshotPatch::parse(r#"{"hostname":"a","hostname":"b"}"#).unwrap();
        assert_eq!(parsed.hostname.as_deref(), Some("b"));
    }

    #[test]
    fn null_backend_state_is_absent() {
        let mut snapshot = StatusSnapshot::default();
        let changes = reconcile(&mut snapshot, patch(json!({ "backendState": null })));

        assert!(changes.is_empty());
        assert_eq!(changes.backend_transition, None);
        assert_eq!(snapshot.backend_state, "Unknown");
    }
}
