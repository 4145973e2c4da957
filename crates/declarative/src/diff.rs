//! Diff between the current and desired state of a drifted resource

use crate::resource::Resource;
use crate::types::ResourceState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A diff between current and desired state of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Current state
    pub current: ResourceState,
    /// Desired state
    pub desired: ResourceState,
}

impl ResourceDiff {
    /// Diff of a resource against an already detected current state, or
    /// `None` when the resource is in sync
    pub fn from_resource(resource: &dyn Resource, current: &ResourceState) -> Option<Self> {
        if resource.in_sync(current) {
            return None;
        }
        Some(Self {
            current: current.clone(),
            desired: resource.desired_state(),
        })
    }

    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Absent, ResourceState::Present { .. })
        )
    }

    /// Check if this diff represents a removal
    pub fn is_removal(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Present { .. }, ResourceState::Absent)
        )
    }
}

impl fmt::Display for ResourceDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.is_addition() {
            "create"
        } else if self.is_removal() {
            "remove"
        } else {
            "modify"
        };
        write!(f, "{verb}: {} -> {}", self.current, self.desired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ApplyContext;
    use crate::types::ApplyResult;

    #[derive(Debug)]
    struct Wanted;

    impl Resource for Wanted {
        fn id(&self) -> String {
            "wanted".into()
        }
        fn description(&self) -> String {
            "wanted".into()
        }
        fn resource_type(&self) -> &'static str {
            "test"
        }
        fn current_state(&self) -> anyhow::Result<ResourceState> {
            Ok(ResourceState::Absent)
        }
        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }
        fn apply(&self, _ctx: &mut ApplyContext) -> anyhow::Result<ApplyResult> {
            Ok(ApplyResult::Created)
        }
    }

    #[test]
    fn test_diff_classification() {
        let diff = ResourceDiff::from_resource(&Wanted, &ResourceState::Absent).unwrap();
        assert!(diff.is_addition());
        assert!(!diff.is_removal());
        assert_eq!(diff.to_string(), "create: absent -> present");

        let in_sync = ResourceState::Present { details: None };
        assert!(ResourceDiff::from_resource(&Wanted, &in_sync).is_none());
    }

    #[test]
    fn test_modification() {
        let diff = ResourceDiff {
            current: ResourceState::Present {
                details: Some("mode=0600".into()),
            },
            desired: ResourceState::Present {
                details: Some("mode=0644".into()),
            },
        };
        assert!(!diff.is_addition() && !diff.is_removal());
        assert_eq!(
            diff.to_string(),
            "modify: present (mode=0600) -> present (mode=0644)"
        );
    }
}
