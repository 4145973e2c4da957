//! Sync history: what each resource looked like the last time it converged

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource key to the digest of the desired state it was last in sync with.
///
/// A resource that drifts from a desired state it already reached before is
/// a corrective change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncHistory {
    entries: BTreeMap<String, String>,
}

impl SyncHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, resource: &str) -> Option<&str> {
        self.entries.get(resource).map(String::as_str)
    }

    pub fn record(&mut self, resource: impl Into<String>, digest: impl Into<String>) {
        self.entries.insert(resource.into(), digest.into());
    }

    /// Whether `resource` previously converged to exactly `digest`
    pub fn converged_to(&self, resource: &str, digest: &str) -> bool {
        self.get(resource) == Some(digest)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
