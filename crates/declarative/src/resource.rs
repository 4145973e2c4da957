//! Resource trait for declarative state management
//!
//! A Resource represents something that can be in a certain state,
//! and can be changed to reach a desired state.

use crate::context::ApplyContext;
use crate::types::{ApplyResult, ResourceState};
use anyhow::Result;
use std::fmt;

/// Core trait for declarative resources
///
/// Every resource in the system implements this trait, which provides:
/// - Identity (id, description, type)
/// - State detection (current vs desired)
/// - State convergence (apply)
/// - Optional refresh when an upstream resource changes
///
/// # Example
///
/// ```ignore
/// use declarative::{Resource, ResourceState, ApplyResult, ApplyContext};
///
/// #[derive(Debug)]
/// struct FileResource {
///     path: String,
///     content: String,
/// }
///
/// impl Resource for FileResource {
///     fn id(&self) -> String {
///         self.path.clone()
///     }
///
///     fn description(&self) -> String {
///         format!("Ensure file exists at {}", self.path)
///     }
///
///     fn resource_type(&self) -> &'static str {
///         "file"
///     }
///
///     fn current_state(&self) -> Result<ResourceState> {
///         if std::path::Path::new(&self.path).exists() {
///             Ok(ResourceState::Present { details: None })
///         } else {
///             Ok(ResourceState::Absent)
///         }
///     }
///
///     fn desired_state(&self) -> ResourceState {
///         ResourceState::Present { details: None }
///     }
///
///     fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
///         std::fs::write(&self.path, &self.content)?;
///         Ok(ApplyResult::Created)
///     }
/// }
/// ```
pub trait Resource: Send + Sync + fmt::Debug {
    /// Unique identifier for this resource
    ///
    /// Stable within its type. Examples:
    /// - "/etc/motd" for a file
    /// - "reload nginx" for an exec
    fn id(&self) -> String;

    /// Human-readable description of what this resource does
    fn description(&self) -> String;

    /// Resource type category, matching the catalog type name
    fn resource_type(&self) -> &'static str;

    /// Detect the current state of this resource
    ///
    /// Must not modify the system.
    fn current_state(&self) -> Result<ResourceState>;

    /// Get the desired state for this resource
    fn desired_state(&self) -> ResourceState;

    /// Whether `current` already satisfies this resource
    ///
    /// Default implementation compares against the desired state.
    fn in_sync(&self, current: &ResourceState) -> bool {
        *current == self.desired_state()
    }

    /// Apply changes to reach the desired state
    ///
    /// Only called when the resource is out of sync and the run converges.
    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult>;

    /// Whether this resource reacts to notifications from upstream changes
    fn is_refreshable(&self) -> bool {
        false
    }

    /// React to a change in a notifying resource
    fn refresh(&self, _ctx: &mut ApplyContext) -> Result<()> {
        anyhow::bail!("{} cannot be refreshed", self.description())
    }
}

/// A boxed resource for type-erased storage
pub type BoxedResource = Box<dyn Resource>;

/// Extension trait for working with boxed resources
pub trait ResourceExt {
    /// Digest of the desired state, recorded in sync history
    fn desired_digest(&self) -> String;
}

impl<R: Resource + ?Sized> ResourceExt for R {
    fn desired_digest(&self) -> String {
        self.desired_state().digest()
    }
}
