// Settings, diagnostics, and maintenance endpoints

use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::client::ApiClient;
use crate::models::SettingsUpdate;

/// Diagnostics runs route and firewall checks on the device and is slow.
const DIAGNOSTICS_TIMEOUT: Duration = Duration::from_secs(60);

impl ApiClient {
    /// `GET settings`
    pub async fn settings(&self) -> Option<Value> {
        self.get("settings").await
    }

    /// Apply a partial settings change.
    ///
    /// `POST settings`
    pub async fn update_settings(&self, update: &SettingsUpdate) -> Option<Value> {
        debug!("updating settings");
        let body = self.encode(update)?;
        self.post("settings", Some(&body)).await
    }

    /// Device diagnostics report, with a 60 s deadline.
    ///
    /// `GET diagnostics`
    pub async fn diagnostics(&self) -> Option<Value> {
        self.call(Method::GET, "diagnostics", None, Some(DIAGNOSTICS_TIMEOUT))
            .await
    }

    /// Recent manager log lines.
    ///
    /// `GET logs`
    pub async fn logs(&self) -> Option<Value> {
        self.get("logs").await
    }

    /// Generate a Tailscale bug report. The response carries its marker.
    ///
    /// `POST bugreport`
    pub async fn bug_report(&self) -> Option<Value> {
        self.post("bugreport", None).await
    }

    /// Ask the manager whether a newer release is available.
    ///
    /// `GET update-check`
    pub async fn update_check(&self) -> Option<Value> {
        self.get("update-check").await
    }
}
