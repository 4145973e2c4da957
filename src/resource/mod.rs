//! Reference providers for the resource types attune manages
//!
//! Every catalog resource type maps to a provider that builds a
//! [`Resource`] with:
//! - State detection (current vs desired)
//! - Apply function (converge current → desired)
//! - Optional refresh when a notifying resource changed

use std::path::Path;

pub use declarative::{
    ApplyContext, ApplyResult, BoxedResource, Provider, ProviderRegistry, Resource, ResourceSpec,
    ResourceState,
};

pub mod exec;
pub mod file;
pub mod notify;

pub use exec::{Exec, ExecProvider};
pub use file::{Ensure, File, FileProvider};
pub use notify::{Notify, NotifyProvider};

/// Registry with every built-in provider. Commands without a `cwd` run in
/// `workdir`.
pub fn default_registry(workdir: &Path) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry
        .register(FileProvider)
        .register(ExecProvider::new(workdir))
        .register(NotifyProvider);
    registry
}
