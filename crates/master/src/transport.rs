//! Forwarding master actions to the elected master

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::api::ApiResponse;
use crate::error::{MasterError, MasterResult};
use crate::metadata::DiscoveryNode;

/// Body of a forwarded action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardedAction {
    /// Action name, possibly a legacy one
    pub action: String,
    pub request: serde_json::Value,
}

/// Transport collaborator used when the local node is not master
#[async_trait]
pub trait MasterTransport: Send + Sync {
    /// Send `payload` to `node` under `action_name` and return its response
    async fn send_to_node(
        &self,
        node: &DiscoveryNode,
        action_name: &str,
        payload: serde_json::Value,
    ) -> MasterResult<serde_json::Value>;
}

/// HTTP transport posting to the master's internal endpoint
pub struct HttpMasterTransport {
    http_client: reqwest::Client,
}

/// Path of the internal forwarding endpoint
pub const FORWARD_PATH: &str = "/api/v1/internal/master";

impl HttpMasterTransport {
    pub fn new(request_timeout: Duration) -> MasterResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| MasterError::Transport(e.to_string()))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl MasterTransport for HttpMasterTransport {
    async fn send_to_node(
        &self,
        node: &DiscoveryNode,
        action_name: &str,
        payload: serde_json::Value,
    ) -> MasterResult<serde_json::Value> {
        let url = format!("http://{}{}", node.http_addr, FORWARD_PATH);
        debug!("Forwarding [{}] to master [{}] at {}", action_name, node.id, url);

        let body = ForwardedAction {
            action: action_name.to_string(),
            request: payload,
        };
        let resp: ApiResponse<serde_json::Value> = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| MasterError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| MasterError::Transport(e.to_string()))?;

        resp.into_result()
    }
}
