//! Apply context and progress reporting
//!
//! These keep the engine independent of any particular terminal UI.

use crate::types::EventStatus;

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback {
    /// Called once with the number of resources about to be evaluated
    fn on_run_start(&mut self, count: usize);

    /// Called when starting to evaluate a single resource
    fn on_resource_start(&mut self, id: &str, description: &str);

    /// Called with the events recorded for a resource
    fn on_resource_complete(&mut self, id: &str, events: &[EventStatus]);

    /// Called when every resource has been evaluated
    fn on_run_complete(&mut self);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_run_start(&mut self, _count: usize) {}
    fn on_resource_start(&mut self, _id: &str, _description: &str) {}
    fn on_resource_complete(&mut self, _id: &str, _events: &[EventStatus]) {}
    fn on_run_complete(&mut self) {}
}

/// Context passed to resource apply and refresh operations
pub struct ApplyContext {
    /// Whether to output verbose information
    pub verbose: bool,
}

impl ApplyContext {
    /// Create a new apply context
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}
