//! HTTP client for the plugin service.

use crate::config::PluginConfig;
use crate::error::PluginError;
use nodeflow_workflow::JsonMap;
use reqwest::Client as HttpClient;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, instrument, warn};

/// Request body for `POST /plugins/{plugin_id}/execute`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest<'a> {
    node_id: &'a str,
    inputs: &'a JsonMap,
    config: &'a JsonMap,
}

/// Response body from the execute endpoint.
#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    success: bool,
    #[serde(default)]
    result: JsonValue,
    #[serde(default)]
    error: Option<String>,
}

/// A plugin advertised by `GET /plugins`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Plugin id; the `<plugin_id>` in `plugin:<plugin_id>/<node_id>`.
    pub id: String,
    /// Node ids the plugin implements.
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Client for the plugin service.
///
/// Timeouts are enforced here, not by the executor.
#[derive(Debug, Clone)]
pub struct PluginClient {
    http: HttpClient,
    base_url: String,
}

impl PluginClient {
    /// Creates a client from configuration.
    pub fn new(config: &PluginConfig) -> Result<Self, Report<PluginError>> {
        let http = HttpClient::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| PluginError::ClientSetup {
                details: e.to_string(),
            })?;

        debug!(base_url = %config.base_url, "plugin client created");

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The service base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Executes `node_id` on `plugin_id` and returns the plugin's `result`.
    ///
    /// A single attempt; there is no retry.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, timeouts, non-2xx statuses, undecodable
    /// bodies and `success: false` responses.
    #[instrument(skip(self, inputs, config), fields(url))]
    pub async fn execute(
        &self,
        plugin_id: &str,
        node_id: &str,
        inputs: &JsonMap,
        config: &JsonMap,
    ) -> Result<JsonValue, PluginError> {
        let url = format!("{}/plugins/{}/execute", self.base_url, plugin_id);
        tracing::Span::current().record("url", url.as_str());

        let response = self
            .http
            .post(&url)
            .json(&ExecuteRequest {
                node_id,
                inputs,
                config,
            })
            .send()
            .await
            .map_err(|e| PluginError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "plugin returned error status");
            return Err(PluginError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: ExecuteResponse = response
            .json()
            .await
            .map_err(|e| PluginError::from_reqwest(&e))?;

        if !body.success {
            return Err(PluginError::Rejected {
                message: body
                    .error
                    .unwrap_or_else(|| "no error message given".to_string()),
            });
        }

        debug!("plugin execution succeeded");
        Ok(body.result)
    }

    /// Lists installed plugins.
    #[instrument(skip(self))]
    pub async fn list_plugins(&self) -> Result<Vec<PluginInfo>, Report<PluginError>> {
        let url = format!("{}/plugins", self.base_url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PluginError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PluginError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let plugins: Vec<PluginInfo> = response
            .json()
            .await
            .map_err(|e| PluginError::from_reqwest(&e))?;

        debug!(count = plugins.len(), "listed plugins");
        Ok(plugins)
    }
}
