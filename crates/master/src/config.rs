//! Master node configuration
//!
//! Loaded from a YAML file, then overridden by command line arguments.

use clap::Parser;
use serde::{Deserialize, Serialize};
use shard_core::MAX_DOCS_PER_SHARD;
use std::time::Duration;

use crate::metadata::{DiscoveryNode, DiscoveryNodes, NodeId, Version};
use crate::pipeline::DEFAULT_QUEUE_CAPACITY;
use crate::resize::DEFAULT_TIMEOUT_MS;

/// Another node of the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    pub id: NodeId,
    pub http_addr: String,
    #[serde(default = "current_version")]
    pub version: Version,
}

fn current_version() -> Version {
    Version::CURRENT
}

/// Master configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// Cluster name
    pub cluster_name: String,
    /// Local node ID
    pub node_id: NodeId,
    /// Version the local node advertises
    pub node_version: Version,
    /// Data directory holding the persisted cluster state
    pub data_dir: String,
    /// HTTP API listen address, also advertised to peers
    pub http_addr: String,
    /// Elected master; the local node when unset
    pub master_node: Option<NodeId>,
    /// Other cluster members
    pub peers: Vec<PeerConfig>,
    /// Capacity of the mutation pipeline queue
    pub queue_capacity: usize,
    /// Default ack timeout of state updates (milliseconds)
    pub ack_timeout_ms: u64,
    /// Timeout of requests forwarded to the master (milliseconds)
    pub forward_timeout_ms: u64,
    /// Doc ceiling of one shard produced by a shrink
    pub max_docs_per_shard: u64,
    /// Log level
    pub log_level: String,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            cluster_name: "default".to_string(),
            node_id: "node1".to_string(),
            node_version: Version::CURRENT,
            data_dir: "./master_data".to_string(),
            http_addr: "0.0.0.0:9200".to_string(),
            master_node: None,
            peers: Vec::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            ack_timeout_ms: DEFAULT_TIMEOUT_MS,
            forward_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_docs_per_shard: MAX_DOCS_PER_SHARD,
            log_level: "info".to_string(),
        }
    }
}

impl MasterConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Load configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to YAML file
    pub fn to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let yaml =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        std::fs::write(path, yaml).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Apply command line overrides (arguments take precedence)
    pub fn merge_args(&mut self, args: &MasterArgs) {
        if let Some(cluster) = &args.cluster {
            self.cluster_name = cluster.clone();
        }
        if let Some(node_id) = &args.node_id {
            self.node_id = node_id.clone();
        }
        if let Some(data_dir) = &args.data_dir {
            self.data_dir = data_dir.clone();
        }
        if let Some(http_addr) = &args.http_addr {
            self.http_addr = http_addr.clone();
        }
        if let Some(master_node) = &args.master_node {
            self.master_node = Some(master_node.clone());
        }
        if let Some(log_level) = &args.log_level {
            self.log_level = log_level.clone();
        }
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }

    /// Membership described by this configuration
    pub fn discovery_nodes(&self) -> DiscoveryNodes {
        let local = DiscoveryNode::new(self.node_id.clone(), self.http_addr.clone(), self.node_version);
        let master = self
            .master_node
            .clone()
            .unwrap_or_else(|| self.node_id.clone());
        self.peers
            .iter()
            .fold(DiscoveryNodes::local(local), |nodes, peer| {
                nodes.with_node(DiscoveryNode::new(
                    peer.id.clone(),
                    peer.http_addr.clone(),
                    peer.version,
                ))
            })
            .with_master(Some(master))
    }
}

/// Master - cluster-state coordination for a sharded store
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "master")]
#[command(about = "Master node coordinating cluster state and index resizing")]
pub struct MasterArgs {
    /// YAML configuration file
    #[arg(long)]
    pub config: Option<String>,

    /// Cluster name
    #[arg(short, long)]
    pub cluster: Option<String>,

    /// Local node ID
    #[arg(long)]
    pub node_id: Option<String>,

    /// Data directory
    #[arg(short, long)]
    pub data_dir: Option<String>,

    /// HTTP API listen address
    #[arg(long)]
    pub http_addr: Option<String>,

    /// ID of the elected master, defaults to the local node
    #[arg(long)]
    pub master_node: Option<String>,

    /// Log level
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Serialize error: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = MasterConfig::from_yaml(
            r#"
cluster_name: prod
node_id: m2
master_node: m1
peers:
  - id: m1
    http_addr: 10.0.0.1:9200
    version: 6.0.1
"#,
        )
        .unwrap();

        assert_eq!(config.cluster_name, "prod");
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.ack_timeout(), Duration::from_secs(30));

        let nodes = config.discovery_nodes();
        assert_eq!(nodes.len(), 2);
        assert!(!nodes.is_local_node_elected_master());
        assert_eq!(nodes.master_node().unwrap().version, Version::new(6, 0, 1));
    }

    #[test]
    fn test_args_override_file() {
        let mut config = MasterConfig::default();
        let args = MasterArgs::parse_from(["master", "--cluster", "logs", "--http-addr", "127.0.0.1:9201"]);
        config.merge_args(&args);

        assert_eq!(config.cluster_name, "logs");
        assert_eq!(config.http_addr, "127.0.0.1:9201");
        assert_eq!(config.node_id, "node1");
        assert!(config.discovery_nodes().is_local_node_elected_master());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("master-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("master.yaml");

        let config = MasterConfig {
            max_docs_per_shard: 1000,
            ..Default::default()
        };
        config.to_file(&path).unwrap();
        assert_eq!(MasterConfig::from_file(&path).unwrap(), config);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
