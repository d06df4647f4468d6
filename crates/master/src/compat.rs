//! Wire-compatible action names
//!
//! Some actions were renamed. A node older than the rename only understands
//! the legacy name, so the dispatcher looks up the destination's version here
//! before forwarding.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::metadata::Version;

/// One renamed action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityEntry {
    pub action: String,
    /// First version that understands `action`
    pub min_version: Version,
    /// Name understood by older nodes
    pub legacy_name: String,
}

/// Action name -> (min version, legacy name)
#[derive(Debug, Clone)]
pub struct CompatibilityTable {
    by_action: HashMap<String, CompatibilityEntry>,
    by_legacy_name: HashMap<String, String>,
}

impl CompatibilityTable {
    /// Table without entries
    pub fn empty() -> Self {
        Self {
            by_action: HashMap::new(),
            by_legacy_name: HashMap::new(),
        }
    }

    pub fn with_entry(mut self, entry: CompatibilityEntry) -> Self {
        self.by_legacy_name
            .insert(entry.legacy_name.clone(), entry.action.clone());
        self.by_action.insert(entry.action.clone(), entry);
        self
    }

    /// Name to send `action` under to a node running `node_version`
    pub fn action_name_for<'a>(&'a self, action: &'a str, node_version: &Version) -> &'a str {
        match self.by_action.get(action) {
            Some(entry) if !node_version.on_or_after(&entry.min_version) => &entry.legacy_name,
            _ => action,
        }
    }

    /// Current name for a received action name, which may be a legacy one
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.by_legacy_name
            .get(name)
            .map(String::as_str)
            .unwrap_or(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CompatibilityEntry> {
        self.by_action.values()
    }
}

impl Default for CompatibilityTable {
    fn default() -> Self {
        Self::empty().with_entry(CompatibilityEntry {
            action: crate::action::resize::RESIZE_ACTION_NAME.to_string(),
            min_version: Version::new(6, 1, 0),
            legacy_name: crate::action::resize::LEGACY_SHRINK_NAME.to_string(),
        })
    }
}
