// Controller integration API key endpoints

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::debug;

use crate::client::ApiClient;

impl ApiClient {
    /// `GET integration/status`
    pub async fn integration_status(&self) -> Option<Value> {
        self.get("integration/status").await
    }

    /// Store and validate a controller integration API key.
    ///
    /// `POST integration/api-key` with `{"apiKey": "..."}`
    pub async fn set_integration_api_key(&self, api_key: &SecretString) -> Option<Value> {
        debug!("setting integration API key");
        let body = json!({ "apiKey": api_key.expose_secret() });
        self.post("integration/api-key", Some(&body)).await
    }

    /// `DELETE integration/api-key`
    pub async fn remove_integration_api_key(&self) -> Option<Value> {
        debug!("removing integration API key");
        self.delete("integration/api-key").await
    }

    /// `POST integration/test`
    pub async fn test_integration_key(&self) -> Option<Value> {
        self.post("integration/test", None).await
    }
}
