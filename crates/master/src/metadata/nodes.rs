//! Discovery nodes and node versions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Node ID
pub type NodeId = String;

/// Node software version, used to pick wire-compatible action names
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    /// Version of this build
    pub const CURRENT: Version = Version::new(7, 10, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn on_or_after(&self, other: &Version) -> bool {
        self >= other
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl std::str::FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(format!("invalid version [{}], expected major.minor.patch", s));
        }
        let parse = |p: &str| {
            p.parse::<u32>()
                .map_err(|_| format!("invalid version [{}], [{}] is not a number", s, p))
        };
        Ok(Version::new(parse(parts[0])?, parse(parts[1])?, parse(parts[2])?))
    }
}

impl TryFrom<String> for Version {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

/// A node known to the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryNode {
    /// Node ID
    pub id: NodeId,
    /// HTTP address (host:port) used to forward master actions
    pub http_addr: String,
    /// Software version
    pub version: Version,
}

impl DiscoveryNode {
    pub fn new(id: impl Into<NodeId>, http_addr: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            http_addr: http_addr.into(),
            version,
        }
    }
}

/// Cluster membership as seen by the local node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryNodes {
    /// The node holding this state
    local_node_id: NodeId,
    /// The elected master, if any
    master_node_id: Option<NodeId>,
    nodes: BTreeMap<NodeId, DiscoveryNode>,
}

impl DiscoveryNodes {
    /// Membership with only the local node
    pub fn local(node: DiscoveryNode) -> Self {
        let local_node_id = node.id.clone();
        let mut nodes = BTreeMap::new();
        nodes.insert(node.id.clone(), node);
        Self {
            local_node_id,
            master_node_id: None,
            nodes,
        }
    }

    /// Single-node membership where the local node is also master
    pub fn single(node: DiscoveryNode) -> Self {
        let master = node.id.clone();
        Self::local(node).with_master(Some(master))
    }

    /// Add or replace a node
    pub fn with_node(mut self, node: DiscoveryNode) -> Self {
        self.nodes.insert(node.id.clone(), node);
        self
    }

    /// Set the elected master
    pub fn with_master(mut self, master: Option<NodeId>) -> Self {
        self.master_node_id = master;
        self
    }

    pub fn local_node_id(&self) -> &NodeId {
        &self.local_node_id
    }

    pub fn local_node(&self) -> Option<&DiscoveryNode> {
        self.nodes.get(&self.local_node_id)
    }

    pub fn master_node_id(&self) -> Option<&NodeId> {
        self.master_node_id.as_ref()
    }

    pub fn master_node(&self) -> Option<&DiscoveryNode> {
        self.nodes.get(self.master_node_id.as_ref()?)
    }

    /// Whether the local node is the elected master
    pub fn is_local_node_elected_master(&self) -> bool {
        self.master_node_id.as_ref() == Some(&self.local_node_id)
    }

    pub fn get(&self, id: &str) -> Option<&DiscoveryNode> {
        self.nodes.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiscoveryNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
