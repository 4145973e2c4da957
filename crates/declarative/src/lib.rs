//! # Declarative
//!
//! Turns a compiled catalog into changes on the machine.
//!
//! ## Core Concepts
//!
//! - **Provider**: Instantiates a concrete [`Resource`] for a catalog resource type
//! - **Resource**: Something with state that can be observed and converged
//! - **ExecutionPlan**: Leaf resources ordered so prerequisites come first
//! - **Report**: Per-resource events, aggregated per resource type
//! - **Outcome**: The single verdict of a run
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{
//!     classify, execute, materialize, ExecuteOptions, ExecutionPlan, Mode,
//!     NoProgress, ProviderRegistry, SyncHistory,
//! };
//!
//! let mut registry = ProviderRegistry::new();
//! registry.register(FileProvider);
//!
//! let resources = materialize(&catalog, &registry)?;
//! let plan = ExecutionPlan::new(resources)?;
//! let options = ExecuteOptions::new(Mode::Observe, "web01");
//! let (report, _) = execute(&plan, &options, &SyncHistory::new(), &mut NoProgress);
//! println!("{}", classify(&report));
//! ```
//!
//! Nothing here knows about terminals. Progress is reported through
//! [`ProgressCallback`].

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod history;
pub mod materialize;
pub mod outcome;
pub mod planner;
pub mod registry;
pub mod report;
pub mod resource;
pub mod types;

pub use context::{ApplyContext, NoProgress, ProgressCallback};
pub use diff::ResourceDiff;
pub use error::{Error, Result};
pub use executor::execute;
pub use history::SyncHistory;
pub use materialize::{MaterializedResource, materialize};
pub use outcome::{Outcome, classify, classify_events};
pub use planner::ExecutionPlan;
pub use registry::{Provider, ProviderRegistry, ResourceSpec};
pub use report::{Report, ResourceEvent, ResourceStatus};
pub use resource::{BoxedResource, Resource, ResourceExt};
pub use types::{ApplyResult, EventStatus, ExecuteOptions, Mode, ResourceState};
