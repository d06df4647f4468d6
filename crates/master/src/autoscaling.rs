//! Autoscaling policies
//!
//! Named policies live in a name-sorted map inside the `autoscaling` custom
//! metadata slot. The state transitions here are pure: they take the current
//! state and return the next one, or the same `Arc` when nothing changes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::info;

use crate::error::{MasterError, MasterResult};
use crate::metadata::{ClusterState, Settings};
use crate::wildcard::simple_match;

/// A named autoscaling policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoscalingPolicy {
    pub name: String,
    /// Node roles the policy governs
    pub roles: BTreeSet<String>,
    /// Decider name -> decider configuration
    #[serde(default)]
    pub deciders: BTreeMap<String, Settings>,
}

impl AutoscalingPolicy {
    pub fn new<R, S>(name: impl Into<String>, roles: R) -> Self
    where
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            deciders: BTreeMap::new(),
        }
    }

    pub fn with_decider(mut self, name: impl Into<String>, settings: Settings) -> Self {
        self.deciders.insert(name.into(), settings);
        self
    }
}

/// Wrapper stored per policy name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoscalingPolicyMetadata {
    pub policy: AutoscalingPolicy,
}

/// Contents of the `autoscaling` custom slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoscalingMetadata {
    policies: BTreeMap<String, AutoscalingPolicyMetadata>,
}

impl AutoscalingMetadata {
    pub fn policy(&self, name: &str) -> Option<&AutoscalingPolicy> {
        self.policies.get(name).map(|m| &m.policy)
    }

    /// Policies in name order
    pub fn policies(&self) -> impl Iterator<Item = &AutoscalingPolicy> {
        self.policies.values().map(|m| &m.policy)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn with_policy(mut self, policy: AutoscalingPolicy) -> Self {
        self.policies
            .insert(policy.name.clone(), AutoscalingPolicyMetadata { policy });
        self
    }
}

/// Put request; absent roles or deciders keep the existing policy's values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutAutoscalingPolicyRequest {
    pub name: String,
    #[serde(default)]
    pub roles: Option<BTreeSet<String>>,
    #[serde(default)]
    pub deciders: Option<BTreeMap<String, Settings>>,
}

impl PutAutoscalingPolicyRequest {
    pub fn from_policy(policy: AutoscalingPolicy) -> Self {
        Self {
            name: policy.name,
            roles: Some(policy.roles),
            deciders: Some(policy.deciders),
        }
    }
}

fn current_policies(state: &ClusterState) -> AutoscalingMetadata {
    state
        .metadata()
        .custom::<AutoscalingMetadata>()
        .cloned()
        .unwrap_or_default()
}

/// Insert or replace a policy by name
///
/// Returns `current` itself when the resulting policy equals the stored one.
pub fn put_autoscaling_policy(
    current: &Arc<ClusterState>,
    request: PutAutoscalingPolicyRequest,
) -> MasterResult<Arc<ClusterState>> {
    if request.name.trim().is_empty() {
        return Err(MasterError::illegal_argument(
            "autoscaling policy name must not be empty",
        ));
    }

    let autoscaling = current_policies(current);
    let existing = autoscaling.policy(&request.name);

    let roles = match (request.roles, existing) {
        (Some(roles), _) => roles,
        (None, Some(existing)) => existing.roles.clone(),
        (None, None) => {
            return Err(MasterError::illegal_argument(format!(
                "new policy [{}] must specify roles",
                request.name
            )))
        }
    };
    let deciders = match (request.deciders, existing) {
        (Some(deciders), _) => deciders,
        (None, Some(existing)) => existing.deciders.clone(),
        (None, None) => BTreeMap::new(),
    };
    let policy = AutoscalingPolicy {
        name: request.name,
        roles,
        deciders,
    };

    match existing {
        Some(existing) if *existing == policy => {
            info!(
                "skipping updating autoscaling policy [{}] due to no change in policy",
                policy.name
            );
            return Ok(current.clone());
        }
        Some(_) => info!("updating autoscaling policy [{}]", policy.name),
        None => info!("adding autoscaling policy [{}]", policy.name),
    }

    let metadata = current
        .metadata()
        .clone()
        .with_custom(autoscaling.with_policy(policy));
    Ok(current.builder().metadata(metadata).build())
}

/// Remove every policy matching `pattern` (`*` wildcards allowed)
pub fn delete_autoscaling_policy(
    current: &Arc<ClusterState>,
    pattern: &str,
) -> MasterResult<Arc<ClusterState>> {
    let autoscaling = current_policies(current);
    let matching: Vec<String> = autoscaling
        .policies()
        .filter(|p| simple_match(pattern, &p.name))
        .map(|p| p.name.clone())
        .collect();

    if matching.is_empty() {
        if pattern.contains('*') {
            // a wildcard that matches nothing is not an error
            return Ok(current.clone());
        }
        return Err(MasterError::ResourceNotFound(format!(
            "autoscaling policy with name [{}] does not exist",
            pattern
        )));
    }

    let mut remaining = autoscaling;
    for name in &matching {
        info!("deleting autoscaling policy [{}]", name);
        remaining.policies.remove(name);
    }
    let metadata = current.metadata().clone().with_custom(remaining);
    Ok(current.builder().metadata(metadata).build())
}

/// Look up one policy
pub fn get_autoscaling_policy(
    state: &ClusterState,
    name: &str,
) -> MasterResult<AutoscalingPolicy> {
    state
        .metadata()
        .custom::<AutoscalingMetadata>()
        .and_then(|m| m.policy(name))
        .cloned()
        .ok_or_else(|| {
            MasterError::ResourceNotFound(format!(
                "autoscaling policy with name [{}] does not exist",
                name
            ))
        })
}
