//! Mock collaborators

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use master::metadata::DiscoveryNode;
use master::resize::{CreateIndexResponse, CreateIndexService, CreateIndexUpdateRequest};
use master::stats::{DocsStats, IndicesStatsProvider};
use master::transport::MasterTransport;
use master::{MasterError, MasterResult};

/// Transport that records forwarded actions and answers with a fixed response
pub struct MockTransport {
    response: serde_json::Value,
    sent: Mutex<Vec<(String, String)>>,
}

impl MockTransport {
    pub fn new(response: serde_json::Value) -> Self {
        Self {
            response,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// (node id, action name) of every forwarded request
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl MasterTransport for MockTransport {
    async fn send_to_node(
        &self,
        node: &DiscoveryNode,
        action_name: &str,
        _payload: serde_json::Value,
    ) -> MasterResult<serde_json::Value> {
        self.sent
            .lock()
            .push((node.id.clone(), action_name.to_string()));
        Ok(self.response.clone())
    }
}

/// Stats provider that is always unreachable
pub struct FailingStats;

#[async_trait]
impl IndicesStatsProvider for FailingStats {
    async fn doc_counts(&self, index: &str) -> MasterResult<HashMap<u32, DocsStats>> {
        Err(MasterError::Transport(format!("stats for [{}] unavailable", index)))
    }
}

/// Create-index service that records requests without touching the state
#[derive(Default)]
pub struct RecordingCreateIndex {
    requests: Mutex<Vec<CreateIndexUpdateRequest>>,
}

impl RecordingCreateIndex {
    pub fn requests(&self) -> Vec<CreateIndexUpdateRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl CreateIndexService for RecordingCreateIndex {
    async fn create_index(&self, request: CreateIndexUpdateRequest) -> MasterResult<CreateIndexResponse> {
        let index = request.index.clone();
        self.requests.lock().push(request);
        Ok(CreateIndexResponse {
            acknowledged: true,
            shards_acknowledged: true,
            index,
        })
    }
}
