//! Execution engine - observes or converges resources in plan order
//!
//! Resources are evaluated one at a time. A failure is recorded in the report
//! and evaluation moves on: dependents of a failed resource are still
//! attempted.

use crate::context::{ApplyContext, ProgressCallback};
use crate::diff::ResourceDiff;
use crate::history::SyncHistory;
use crate::materialize::MaterializedResource;
use crate::planner::ExecutionPlan;
use crate::report::{Report, ResourceStatus};
use crate::resource::{Resource, ResourceExt};
use crate::types::{ApplyResult, EventStatus, ExecuteOptions};
use log::{debug, info, warn};

/// Execute a plan and report what happened
///
/// # Arguments
/// * `plan` - The ordered resources
/// * `opts` - Mode and node
/// * `history` - Digests of previously converged states
/// * `progress` - Progress callback
///
/// # Returns
/// The report and the updated history (unchanged when observing)
pub fn execute<P: ProgressCallback>(
    plan: &ExecutionPlan,
    opts: &ExecuteOptions,
    history: &SyncHistory,
    progress: &mut P,
) -> (Report, SyncHistory) {
    let resources = plan.resources();
    let mut report = Report::new(&opts.node, opts.mode);
    let mut next_history = history.clone();

    // Resources that changed, or would have, and so refresh what they notify
    let mut changed = vec![false; resources.len()];
    let mut notified_by: Vec<Vec<usize>> = vec![Vec::new(); resources.len()];
    for (index, resource) in resources.iter().enumerate() {
        for &target in &resource.notify {
            notified_by[target].push(index);
        }
    }

    progress.on_run_start(resources.len());
    for &index in plan.order() {
        let resource = &resources[index];
        let id = resource.key.to_string();
        let triggered = notified_by[index].iter().any(|&source| changed[source]);

        let mut status = ResourceStatus::new(&id, &resource.key.type_name);
        match &resource.instance {
            Ok(instance) => {
                progress.on_resource_start(&id, &instance.description());
                let outcome = evaluate(resource, &**instance, opts, history, triggered, &mut status);
                changed[index] = outcome.changed;
                if let Some(digest) = outcome.converged {
                    next_history.record(&id, digest);
                }
            }
            Err(message) => {
                progress.on_resource_start(&id, &id);
                status.events.push(EventStatus::Failed);
                status.message = Some(message.clone());
            }
        }

        log_status(&status);
        progress.on_resource_complete(&id, &status.events);
        report.push_status(status);
    }
    progress.on_run_complete();

    if opts.mode.is_observe() {
        next_history = history.clone();
    }
    (report, next_history)
}

struct Evaluation {
    /// Changed or would have changed
    changed: bool,
    /// Digest to remember when the resource ended up in sync
    converged: Option<String>,
}

fn evaluate(
    resource: &MaterializedResource,
    instance: &dyn Resource,
    opts: &ExecuteOptions,
    history: &SyncHistory,
    triggered: bool,
    status: &mut ResourceStatus,
) -> Evaluation {
    let observe = opts.mode.is_observe() || resource.noop;
    let mut ctx = ApplyContext::new(opts.verbose);

    let current = match instance.current_state() {
        Ok(current) => current,
        Err(e) => {
            status.events.push(EventStatus::Failed);
            status.message = Some(format!("could not read current state: {e:#}"));
            return Evaluation {
                changed: false,
                converged: None,
            };
        }
    };
    let digest = instance.desired_digest();

    let Some(diff) = ResourceDiff::from_resource(instance, &current) else {
        if triggered && instance.is_refreshable() {
            if observe {
                status.events.push(EventStatus::Scheduled);
                status.message = Some("would refresh".to_string());
            } else {
                match instance.refresh(&mut ctx) {
                    Ok(()) => status.events.push(EventStatus::Restarted),
                    Err(e) => {
                        status.events.push(EventStatus::FailedToRestart);
                        status.message = Some(format!("{e:#}"));
                    }
                }
            }
        } else {
            status.events.push(EventStatus::Unchanged);
        }
        return Evaluation {
            changed: false,
            converged: Some(digest),
        };
    };

    status.events.push(EventStatus::OutOfSync);
    if history.converged_to(&status.resource, &digest) {
        status.events.push(EventStatus::CorrectiveChange);
    }
    debug!("{}: {}", status.resource, diff);
    status.diff = Some(diff);

    if observe {
        status.message = Some("would change".to_string());
        return Evaluation {
            changed: true,
            converged: None,
        };
    }

    let result = instance.apply(&mut ctx).unwrap_or_else(|e| ApplyResult::Failed {
        error: format!("{e:#}"),
    });
    match result {
        ApplyResult::Created | ApplyResult::Modified | ApplyResult::Removed => {
            status.events.push(EventStatus::Changed);
            Evaluation {
                changed: true,
                converged: verified(instance, digest),
            }
        }
        ApplyResult::NoChange => {
            status.events.push(EventStatus::Unchanged);
            Evaluation {
                changed: false,
                converged: verified(instance, digest),
            }
        }
        ApplyResult::Skipped { reason } => {
            status.events.push(EventStatus::Skipped);
            status.message = Some(reason);
            Evaluation {
                changed: false,
                converged: None,
            }
        }
        ApplyResult::Failed { error } => {
            status.events.push(EventStatus::Failed);
            status.message = Some(error);
            Evaluation {
                changed: false,
                converged: None,
            }
        }
    }
}

/// Digest to remember once a re-read confirms the resource is in sync.
/// Resources that drift on every run never get one.
fn verified(instance: &dyn Resource, digest: String) -> Option<String> {
    match instance.current_state() {
        Ok(current) if instance.in_sync(&current) => Some(digest),
        Ok(_) => None,
        Err(e) => {
            debug!("{}: could not re-read state: {e:#}", instance.id());
            None
        }
    }
}

fn log_status(status: &ResourceStatus) {
    let events = status
        .events
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let message = status.message.as_deref().unwrap_or_default();
    if status.failed() {
        warn!("{}: {} {}", status.resource, events, message);
    } else if status.has(EventStatus::Unchanged) {
        debug!("{}: {}", status.resource, events);
    } else {
        info!("{}: {} {}", status.resource, events, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoProgress;
    use crate::outcome::{Outcome, classify};
    use crate::types::{Mode, ResourceState};
    use anyhow::Result;
    use catalog::ResourceKey;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    /// In-memory resource: `present` is the system, `want` the desired state
    #[derive(Debug)]
    struct TestResource {
        id: String,
        present: Arc<Mutex<bool>>,
        want: bool,
        fail_read: bool,
        fail_apply: bool,
        refreshable: bool,
        fail_refresh: bool,
        log: Log,
    }

    impl TestResource {
        fn new(id: &str, present: bool, want: bool, log: &Log) -> Self {
            Self {
                id: id.to_string(),
                present: Arc::new(Mutex::new(present)),
                want,
                fail_read: false,
                fail_apply: false,
                refreshable: false,
                fail_refresh: false,
                log: Arc::clone(log),
            }
        }
    }

    fn state(present: bool) -> ResourceState {
        if present {
            ResourceState::Present { details: None }
        } else {
            ResourceState::Absent
        }
    }

    impl Resource for TestResource {
        fn id(&self) -> String {
            self.id.clone()
        }

        fn description(&self) -> String {
            format!("Test resource {}", self.id)
        }

        fn resource_type(&self) -> &'static str {
            "test"
        }

        fn current_state(&self) -> Result<ResourceState> {
            if self.fail_read {
                anyhow::bail!("unreadable");
            }
            Ok(state(*self.present.lock().unwrap()))
        }

        fn desired_state(&self) -> ResourceState {
            state(self.want)
        }

        fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
            self.log.lock().unwrap().push(format!("apply {}", self.id));
            if self.fail_apply {
                return Ok(ApplyResult::Failed {
                    error: "boom".into(),
                });
            }
            *self.present.lock().unwrap() = self.want;
            Ok(if self.want {
                ApplyResult::Created
            } else {
                ApplyResult::Removed
            })
        }

        fn is_refreshable(&self) -> bool {
            self.refreshable
        }

        fn refresh(&self, _ctx: &mut ApplyContext) -> Result<()> {
            self.log.lock().unwrap().push(format!("refresh {}", self.id));
            if self.fail_refresh {
                anyhow::bail!("restart failed");
            }
            Ok(())
        }
    }

    fn entry(index: usize, resource: TestResource) -> MaterializedResource {
        MaterializedResource {
            key: ResourceKey::new("test", resource.id.clone()),
            index,
            instance: Ok(Box::new(resource)),
            noop: false,
            prerequisites: Vec::new(),
            notify: Vec::new(),
        }
    }

    fn run(resources: Vec<MaterializedResource>, mode: Mode, history: &SyncHistory) -> (Report, SyncHistory) {
        let plan = ExecutionPlan::new(resources).unwrap();
        execute(&plan, &ExecuteOptions::new(mode, "node1"), history, &mut NoProgress)
    }

    fn events(report: &Report, index: usize) -> Vec<EventStatus> {
        report.resource_statuses[index].events.clone()
    }

    #[test]
    fn test_empty_plan_is_conformed() {
        let (report, history) = run(Vec::new(), Mode::Apply, &SyncHistory::new());
        assert!(report.resource_statuses.is_empty());
        assert!(history.is_empty());
        assert_eq!(classify(&report), Outcome::Conformed);
    }

    #[test]
    fn test_in_sync_resource_is_unchanged() {
        let log = Log::default();
        let (report, history) = run(
            vec![entry(0, TestResource::new("a", true, true, &log))],
            Mode::Apply,
            &SyncHistory::new(),
        );
        assert_eq!(events(&report, 0), vec![EventStatus::Unchanged]);
        assert!(log.lock().unwrap().is_empty());
        assert!(history.get("Test[a]").is_some());
        assert_eq!(report.node, "node1");
    }

    #[test]
    fn test_apply_converges_drift() {
        let log = Log::default();
        let (report, _) = run(
            vec![entry(0, TestResource::new("a", false, true, &log))],
            Mode::Apply,
            &SyncHistory::new(),
        );
        assert_eq!(events(&report, 0), vec![EventStatus::OutOfSync, EventStatus::Changed]);
        assert_eq!(*log.lock().unwrap(), vec!["apply a"]);
        assert!(report.resource_statuses[0].diff.as_ref().unwrap().is_addition());
        assert_eq!(classify(&report), Outcome::Changes);
    }

    #[test]
    fn test_observe_never_applies() {
        let log = Log::default();
        let history = SyncHistory::new();
        let (report, next) = run(
            vec![
                entry(0, TestResource::new("a", false, true, &log)),
                entry(1, TestResource::new("b", true, true, &log)),
            ],
            Mode::Observe,
            &history,
        );
        assert_eq!(events(&report, 0), vec![EventStatus::OutOfSync]);
        assert_eq!(events(&report, 1), vec![EventStatus::Unchanged]);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(next, history);
        assert_eq!(classify(&report), Outcome::Changes);
    }

    #[test]
    fn test_noop_resource_is_only_observed() {
        let log = Log::default();
        let mut resource = entry(0, TestResource::new("a", false, true, &log));
        resource.noop = true;
        let (report, _) = run(vec![resource], Mode::Apply, &SyncHistory::new());
        assert_eq!(events(&report, 0), vec![EventStatus::OutOfSync]);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_corrective_change_uses_history() {
        let log = Log::default();
        let resource = TestResource::new("a", false, true, &log);
        let digest = resource.desired_digest();
        let mut history = SyncHistory::new();
        history.record("Test[a]", digest);

        let (report, _) = run(vec![entry(0, resource)], Mode::Observe, &history);
        assert_eq!(
            events(&report, 0),
            vec![EventStatus::OutOfSync, EventStatus::CorrectiveChange]
        );
    }

    #[test]
    fn test_failures_are_recorded_and_execution_continues() {
        let log = Log::default();
        let mut unreadable = TestResource::new("read", true, true, &log);
        unreadable.fail_read = true;
        let mut broken = TestResource::new("apply", false, true, &log);
        broken.fail_apply = true;
        let missing = MaterializedResource {
            key: ResourceKey::new("test", "missing"),
            index: 2,
            instance: Err("bad parameter".into()),
            noop: false,
            prerequisites: Vec::new(),
            notify: Vec::new(),
        };
        let mut dependent = entry(3, TestResource::new("after", false, true, &log));
        dependent.prerequisites = vec![1];

        let (report, _) = run(
            vec![entry(0, unreadable), entry(1, broken), missing, dependent],
            Mode::Apply,
            &SyncHistory::new(),
        );

        assert_eq!(events(&report, 0), vec![EventStatus::Failed]);
        assert_eq!(events(&report, 1), vec![EventStatus::OutOfSync, EventStatus::Failed]);
        assert_eq!(report.resource_statuses[1].message.as_deref(), Some("boom"));
        assert_eq!(events(&report, 2), vec![EventStatus::Failed]);
        // The dependent of a failed resource is still attempted
        assert_eq!(events(&report, 3), vec![EventStatus::OutOfSync, EventStatus::Changed]);
        assert_eq!(classify(&report), Outcome::Failures);
    }

    #[test]
    fn test_notification_refreshes_in_sync_subscriber() {
        let log = Log::default();
        let mut source = entry(0, TestResource::new("config", false, true, &log));
        source.notify = vec![1];
        let mut service = TestResource::new("service", true, true, &log);
        service.refreshable = true;
        let mut target = entry(1, service);
        target.prerequisites = vec![0];

        let (report, _) = run(vec![source, target], Mode::Apply, &SyncHistory::new());
        assert_eq!(events(&report, 1), vec![EventStatus::Restarted]);
        assert_eq!(*log.lock().unwrap(), vec!["apply config", "refresh service"]);
    }

    #[test]
    fn test_notification_is_scheduled_when_observing() {
        let log = Log::default();
        let mut source = entry(0, TestResource::new("config", false, true, &log));
        source.notify = vec![1];
        let mut service = TestResource::new("service", true, true, &log);
        service.refreshable = true;
        let mut target = entry(1, service);
        target.prerequisites = vec![0];

        let (report, _) = run(vec![source, target], Mode::Observe, &SyncHistory::new());
        assert_eq!(events(&report, 1), vec![EventStatus::Scheduled]);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failed_refresh() {
        let log = Log::default();
        let mut source = entry(0, TestResource::new("config", true, false, &log));
        source.notify = vec![1];
        let mut service = TestResource::new("service", true, true, &log);
        service.refreshable = true;
        service.fail_refresh = true;
        let mut target = entry(1, service);
        target.prerequisites = vec![0];

        let (report, _) = run(vec![source, target], Mode::Apply, &SyncHistory::new());
        assert_eq!(events(&report, 0), vec![EventStatus::OutOfSync, EventStatus::Changed]);
        assert_eq!(events(&report, 1), vec![EventStatus::FailedToRestart]);
        assert_eq!(classify(&report), Outcome::Failures);
    }

    #[test]
    fn test_unchanged_upstream_does_not_refresh() {
        let log = Log::default();
        let mut source = entry(0, TestResource::new("config", true, true, &log));
        source.notify = vec![1];
        let mut service = TestResource::new("service", true, true, &log);
        service.refreshable = true;
        let target = entry(1, service);

        let (report, _) = run(vec![source, target], Mode::Apply, &SyncHistory::new());
        assert_eq!(events(&report, 1), vec![EventStatus::Unchanged]);
        assert_eq!(classify(&report), Outcome::Conformed);
    }

    #[test]
    fn test_history_only_records_confirmed_state() {
        let log = Log::default();
        // apply reports a change but the system never follows
        let stubborn = StubbornResource(TestResource::new("stubborn", false, true, &log));
        let plain = TestResource::new("plain", false, true, &log);

        let resources = vec![
            MaterializedResource {
                key: ResourceKey::new("test", "stubborn"),
                index: 0,
                instance: Ok(Box::new(stubborn)),
                noop: false,
                prerequisites: Vec::new(),
                notify: Vec::new(),
            },
            entry(1, plain),
        ];
        let (_, history) = run(resources, Mode::Apply, &SyncHistory::new());
        assert!(history.get("Test[stubborn]").is_none());
        assert!(history.get("Test[plain]").is_some());
    }

    #[derive(Debug)]
    struct StubbornResource(TestResource);

    impl Resource for StubbornResource {
        fn id(&self) -> String {
            self.0.id()
        }

        fn description(&self) -> String {
            self.0.description()
        }

        fn resource_type(&self) -> &'static str {
            "test"
        }

        fn current_state(&self) -> Result<ResourceState> {
            Ok(ResourceState::Absent)
        }

        fn desired_state(&self) -> ResourceState {
            self.0.desired_state()
        }

        fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
            Ok(ApplyResult::Modified)
        }
    }

    #[test]
    fn test_events_follow_plan_order() {
        let log = Log::default();
        let mut first = entry(0, TestResource::new("late", false, true, &log));
        first.prerequisites = vec![1];
        let second = entry(1, TestResource::new("early", false, true, &log));

        let (report, _) = run(vec![first, second], Mode::Apply, &SyncHistory::new());
        assert_eq!(report.resource_statuses[0].resource, "Test[early]");
        assert_eq!(*log.lock().unwrap(), vec!["apply early", "apply late"]);
    }
}
