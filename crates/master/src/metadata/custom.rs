//! Custom metadata slots
//!
//! Plugins keep their own cluster-wide data in named slots of [`Metadata`].
//! Each slot type implements [`MetadataCustom`] so it can be read back typed.
//!
//! [`Metadata`]: super::Metadata

use serde::{Deserialize, Serialize};

use crate::autoscaling::AutoscalingMetadata;
use crate::snapshot::SnapshotsMetadata;

/// Every custom slot this node knows about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CustomMetadata {
    Autoscaling(AutoscalingMetadata),
    Snapshots(SnapshotsMetadata),
}

impl CustomMetadata {
    /// Slot name
    pub fn name(&self) -> &'static str {
        match self {
            CustomMetadata::Autoscaling(_) => AutoscalingMetadata::NAME,
            CustomMetadata::Snapshots(_) => SnapshotsMetadata::NAME,
        }
    }
}

/// Typed access to one custom slot
pub trait MetadataCustom: Clone + Sized {
    /// Slot name
    const NAME: &'static str;

    fn from_custom(custom: &CustomMetadata) -> Option<&Self>;

    fn into_custom(self) -> CustomMetadata;
}

impl MetadataCustom for AutoscalingMetadata {
    const NAME: &'static str = "autoscaling";

    fn from_custom(custom: &CustomMetadata) -> Option<&Self> {
        match custom {
            CustomMetadata::Autoscaling(m) => Some(m),
            _ => None,
        }
    }

    fn into_custom(self) -> CustomMetadata {
        CustomMetadata::Autoscaling(self)
    }
}

impl MetadataCustom for SnapshotsMetadata {
    const NAME: &'static str = "snapshots";

    fn from_custom(custom: &CustomMetadata) -> Option<&Self> {
        match custom {
            CustomMetadata::Snapshots(m) => Some(m),
            _ => None,
        }
    }

    fn into_custom(self) -> CustomMetadata {
        CustomMetadata::Snapshots(self)
    }
}
