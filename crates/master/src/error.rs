//! Master error taxonomy
//!
//! Every failure a master action can surface. Variants carry plain data so an
//! error raised on the elected master can travel back to a forwarding node
//! unchanged.

use serde::{Deserialize, Serialize};
use shard_core::RemapError;

/// Master action error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "reason", rename_all = "snake_case")]
pub enum MasterError {
    /// The local node is not (or no longer) the elected master
    #[error("node [{local_node}] is not the elected master (known master: {master_node:?})")]
    NotMaster {
        local_node: String,
        master_node: Option<String>,
    },
    /// A cluster block forbids the operation
    #[error("blocked by: {description}")]
    ClusterBlocked { description: String, retryable: bool },
    #[error("no such index [{0}]")]
    IndexNotFound(String),
    #[error("index [{0}] already exists")]
    IndexAlreadyExists(String),
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    #[error("{0}")]
    IllegalArgument(String),
    #[error("{0}")]
    IllegalState(String),
    /// Shard counts incompatible with the requested resize
    #[error("{0}")]
    RemapInfeasible(#[from] RemapError),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("state store failure: {0}")]
    Store(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

impl MasterError {
    /// Whether the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        match self {
            MasterError::NotMaster { .. } => true,
            MasterError::ClusterBlocked { retryable, .. } => *retryable,
            MasterError::Timeout(_) | MasterError::Transport(_) => true,
            _ => false,
        }
    }

    pub fn illegal_argument(msg: impl Into<String>) -> Self {
        MasterError::IllegalArgument(msg.into())
    }

    pub fn illegal_state(msg: impl Into<String>) -> Self {
        MasterError::IllegalState(msg.into())
    }
}

/// Result alias for master operations
pub type MasterResult<T> = Result<T, MasterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        let not_master = MasterError::NotMaster {
            local_node: "n1".to_string(),
            master_node: None,
        };
        assert!(not_master.is_retryable());
        assert!(!MasterError::IndexNotFound("logs".to_string()).is_retryable());
        assert!(!MasterError::ClusterBlocked {
            description: "[8/index write (api)]".to_string(),
            retryable: false,
        }
        .is_retryable());
    }

    #[test]
    fn test_round_trips_through_json() {
        let err = MasterError::RemapInfeasible(RemapError::CountMismatch { num_source: 3, num_target: 4 });
        let json = serde_json::to_string(&err).unwrap();
        let back: MasterError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
        assert_eq!(
            back.to_string(),
            "the number of target shards (4) must be the same as the number of source shards (3)"
        );
    }
}
