//! Exec resource - run shell commands, guarded or on refresh

use anyhow::{Context, Result, bail};
use std::path::PathBuf;

use super::{ApplyContext, ApplyResult, BoxedResource, Provider, Resource, ResourceSpec, ResourceState};
use crate::runner::{self, ShellOutput};

const PARAMETERS: &[&str] = &[
    "command",
    "cwd",
    "creates",
    "onlyif",
    "unless",
    "refreshonly",
    "returns",
];

/// A command to run through `sh -c`
#[derive(Debug, Clone)]
pub struct Exec {
    pub command: String,
    pub cwd: PathBuf,
    /// Skip when this path exists; relative to `cwd`
    pub creates: Option<PathBuf>,
    /// Only run when this command succeeds
    pub onlyif: Option<String>,
    /// Skip when this command succeeds
    pub unless: Option<String>,
    /// Only run when notified
    pub refreshonly: bool,
    /// Exit codes that count as success
    pub returns: Vec<i32>,
}

impl Exec {
    pub fn new(command: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            cwd: cwd.into(),
            creates: None,
            onlyif: None,
            unless: None,
            refreshonly: false,
            returns: vec![0],
        }
    }

    /// Why the command should not run now, if it shouldn't
    fn guard(&self) -> Option<String> {
        if let Some(creates) = &self.creates
            && self.cwd.join(creates).exists()
        {
            return Some(format!("{} exists", creates.display()));
        }
        if let Some(onlyif) = &self.onlyif
            && !runner::run_quiet(onlyif, &self.cwd)
        {
            return Some(format!("onlyif '{onlyif}' failed"));
        }
        if let Some(unless) = &self.unless
            && runner::run_quiet(unless, &self.cwd)
        {
            return Some(format!("unless '{unless}' succeeded"));
        }
        None
    }

    fn run(&self) -> Result<std::result::Result<ShellOutput, String>> {
        log::debug!("Running '{}' in {}", self.command, self.cwd.display());
        let output = runner::run_shell(&self.command, &self.cwd)?;
        if output.code.is_some_and(|code| self.returns.contains(&code)) {
            return Ok(Ok(output));
        }

        let code = output
            .code
            .map_or_else(|| "a signal".to_string(), |c| c.to_string());
        let mut error = format!(
            "'{}' returned {} instead of one of {:?}",
            self.command, code, self.returns
        );
        if !output.stderr.is_empty() {
            error.push_str(": ");
            error.push_str(&output.stderr);
        }
        Ok(Err(error))
    }
}

impl Resource for Exec {
    fn id(&self) -> String {
        self.command.clone()
    }

    fn description(&self) -> String {
        format!("Run {}", self.command)
    }

    fn resource_type(&self) -> &'static str {
        "exec"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.refreshonly {
            return Ok(ResourceState::Present {
                details: Some("refresh only".to_string()),
            });
        }
        Ok(match self.guard() {
            Some(reason) => ResourceState::Present {
                details: Some(reason),
            },
            None => ResourceState::Absent,
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some(format!("ran {}", self.command)),
        }
    }

    /// Any guarded state counts: the command only needs to run when nothing stops it
    fn in_sync(&self, current: &ResourceState) -> bool {
        current.is_present()
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        match self.run()? {
            Ok(output) => {
                if ctx.verbose && !output.stdout.is_empty() {
                    log::info!("{}: {}", self.command, output.stdout);
                }
                Ok(ApplyResult::Modified)
            }
            Err(error) => Ok(ApplyResult::Failed { error }),
        }
    }

    fn is_refreshable(&self) -> bool {
        true
    }

    fn refresh(&self, _ctx: &mut ApplyContext) -> Result<()> {
        if let Some(reason) = self.guard() {
            log::debug!("Not refreshing '{}': {}", self.command, reason);
            return Ok(());
        }
        match self.run()? {
            Ok(_) => Ok(()),
            Err(error) => bail!(error),
        }
    }
}

/// Builds [`Exec`] resources; commands run in the working area unless `cwd`
/// says otherwise
pub struct ExecProvider {
    workdir: PathBuf,
}

impl ExecProvider {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }
}

impl Provider for ExecProvider {
    fn resource_type(&self) -> &'static str {
        "exec"
    }

    fn instantiate(&self, spec: &ResourceSpec) -> Result<BoxedResource> {
        spec.check_known(PARAMETERS)?;

        let command = spec.string_or_title("command")?;
        if command.trim().is_empty() {
            bail!("command is empty");
        }
        let cwd = spec
            .string("cwd")?
            .map_or_else(|| self.workdir.clone(), |cwd| crate::paths::expand(&cwd));

        let mut exec = Exec::new(command, cwd);
        exec.creates = spec.string("creates")?.map(PathBuf::from);
        exec.onlyif = spec.string("onlyif")?;
        exec.unless = spec.string("unless")?;
        exec.refreshonly = spec.boolean("refreshonly")?.unwrap_or(false);

        let returns = spec.string_list("returns")?;
        if !returns.is_empty() {
            exec.returns = returns
                .iter()
                .map(|code| {
                    code.parse::<i32>()
                        .with_context(|| format!("invalid exit code '{code}' in returns"))
                })
                .collect::<Result<_>>()?;
        }
        Ok(Box::new(exec))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use catalog::Value;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn ctx() -> ApplyContext {
        ApplyContext::new(false)
    }

    #[test]
    fn test_unguarded_command_drifts_and_runs() {
        let dir = TempDir::new().unwrap();
        let exec = Exec::new("echo ran > out", dir.path());

        let current = exec.current_state().unwrap();
        assert!(!exec.in_sync(&current));
        assert_eq!(exec.apply(&mut ctx()).unwrap(), ApplyResult::Modified);
        assert_eq!(fs::read_to_string(dir.path().join("out")).unwrap(), "ran\n");
        // Still drifted: nothing guards it
        assert!(!exec.in_sync(&exec.current_state().unwrap()));
    }

    #[test]
    fn test_creates_guard() {
        let dir = TempDir::new().unwrap();
        let mut exec = Exec::new("touch made", dir.path());
        exec.creates = Some(dir.path().join("made"));

        assert!(!exec.in_sync(&exec.current_state().unwrap()));
        exec.apply(&mut ctx()).unwrap();
        assert!(exec.in_sync(&exec.current_state().unwrap()));
    }

    #[test]
    fn test_onlyif_and_unless() {
        let dir = TempDir::new().unwrap();
        let mut onlyif = Exec::new("true", dir.path());
        onlyif.onlyif = Some("false".into());
        assert!(onlyif.in_sync(&onlyif.current_state().unwrap()));

        let mut unless = Exec::new("true", dir.path());
        unless.unless = Some("true".into());
        assert!(unless.in_sync(&unless.current_state().unwrap()));

        unless.unless = Some("false".into());
        assert!(!unless.in_sync(&unless.current_state().unwrap()));
    }

    #[test]
    fn test_unexpected_exit_code_fails() {
        let dir = TempDir::new().unwrap();
        let exec = Exec::new("echo broken >&2; exit 2", dir.path());
        match exec.apply(&mut ctx()).unwrap() {
            ApplyResult::Failed { error } => {
                assert!(error.contains("returned 2"), "{error}");
                assert!(error.contains("broken"), "{error}");
            }
            other => panic!("expected failure, got {other:?}"),
        }

        let mut tolerant = Exec::new("exit 2", dir.path());
        tolerant.returns = vec![0, 2];
        assert_eq!(tolerant.apply(&mut ctx()).unwrap(), ApplyResult::Modified);
    }

    #[test]
    fn test_refreshonly_runs_on_refresh() {
        let dir = TempDir::new().unwrap();
        let mut exec = Exec::new("touch refreshed", dir.path());
        exec.refreshonly = true;

        assert!(exec.in_sync(&exec.current_state().unwrap()));
        assert!(exec.is_refreshable());
        exec.refresh(&mut ctx()).unwrap();
        assert!(dir.path().join("refreshed").exists());

        let failing = Exec::new("exit 1", dir.path());
        assert!(failing.refresh(&mut ctx()).is_err());
    }

    #[test]
    fn test_provider() {
        let dir = TempDir::new().unwrap();
        let provider = ExecProvider::new(dir.path());

        let mut parameters = BTreeMap::new();
        parameters.insert("refreshonly".to_string(), Value::Boolean(true));
        parameters.insert(
            "returns".to_string(),
            Value::Array(vec![Value::Integer(0), Value::Integer(3)]),
        );
        let resource = provider
            .instantiate(&ResourceSpec::new("touch here", parameters))
            .unwrap();
        assert_eq!(resource.id(), "touch here");
        assert!(resource.in_sync(&resource.current_state().unwrap()));
        resource.refresh(&mut ctx()).unwrap();
        assert!(dir.path().join("here").exists());

        let mut bad = BTreeMap::new();
        bad.insert("returns".to_string(), Value::from("zero"));
        assert!(provider.instantiate(&ResourceSpec::new("true", bad)).is_err());
        assert!(provider.instantiate(&ResourceSpec::new("  ", BTreeMap::new())).is_err());
    }
}
