//! The pipeline driver: compile a script, enforce it, print the verdict
//!
//! stdout gets exactly one line (`conformed`, `changes` or `failures`); the
//! report always goes to stderr.

use anyhow::{Context, Result, bail};
use catalog::{EnvironmentContext, FactSet};
use declarative::{
    ExecuteOptions, ExecutionPlan, Mode, NoProgress, Outcome, ProgressCallback, Report, SyncHistory,
};
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use tempfile::TempDir;

use crate::cli::{Cli, ReportFormat};
use crate::config::Config;
use crate::state::HistoryStore;
use crate::{facts, paths, resource, ui};

/// Exit status for a completed pipeline, whatever the outcome
pub const EXIT_OK: u8 = 0;
/// Exit status for invalid input or a structural failure
pub const EXIT_ERROR: u8 = 1;

/// Where configuration and state live
#[derive(Debug, Clone)]
pub struct Dirs {
    pub config: PathBuf,
    pub state: PathBuf,
}

impl Dirs {
    pub fn resolve() -> Result<Self> {
        Ok(Self {
            config: paths::config_dir()?,
            state: paths::state_dir()?,
        })
    }
}

/// Everything one enforcement needs, resolved from flags, config and the machine
#[derive(Debug)]
pub struct Invocation {
    pub script: String,
    pub node: String,
    pub facts: FactSet,
    pub modulepath: Vec<PathBuf>,
    pub workdir: PathBuf,
    pub history: Option<HistoryStore>,
    pub verbose: bool,
}

/// Run the CLI against `out` (the outcome line) and `err` (report and errors)
/// and return the process exit status.
///
/// `dirs` is only called once the mode is known to be valid.
pub fn execute(
    cli: &Cli,
    dirs: impl FnOnce() -> Result<Dirs>,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> u8 {
    // The mode is checked before anything is read, resolved or compiled
    let mode: Mode = match cli.mode.parse() {
        Ok(mode) => mode,
        Err(e) => {
            let _ = writeln!(err, "error: {e}");
            let _ = writeln!(out, "{}", Outcome::Failures);
            return EXIT_ERROR;
        }
    };

    let dirs = match dirs() {
        Ok(dirs) => dirs,
        Err(e) => {
            let _ = writeln!(err, "error: {e:#}");
            return EXIT_ERROR;
        }
    };

    match drive(mode, cli, &dirs, err) {
        Ok(outcome) => {
            let _ = writeln!(out, "{outcome}");
            EXIT_OK
        }
        Err(e) => {
            let _ = writeln!(err, "error: {e:#}");
            EXIT_ERROR
        }
    }
}

fn drive(mode: Mode, cli: &Cli, dirs: &Dirs, err: &mut dyn Write) -> Result<Outcome> {
    let config = Config::load_from(&dirs.config)?;
    let script = read_script(cli)?;

    let mut facts = facts::collect();
    if let Some(path) = cli.facts.clone().or_else(|| config.facts_file()) {
        facts.merge(facts::load_file(&path)?);
    }
    let node = cli
        .node
        .clone()
        .or_else(|| config.node.clone())
        .unwrap_or_else(|| facts::synthetic_node_name(&facts));

    let modulepath = if !cli.modulepath.is_empty() {
        cli.modulepath.clone()
    } else if !config.modulepath.is_empty() {
        config.modulepath()
    } else {
        paths::default_modulepath().unwrap_or_else(|e| {
            log::warn!("No default module path: {e:#}");
            Vec::new()
        })
    };

    let history = (!cli.no_history && config.history).then(|| HistoryStore::new(&dirs.state));

    // Working area: explicit directories persist, the default one is removed afterwards
    let (workdir, scratch) = match cli.workdir.clone().or_else(|| config.workdir()) {
        Some(dir) => {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create working area {}", dir.display()))?;
            (dir, None)
        }
        None => {
            let scratch = TempDir::with_prefix("attune-")
                .context("Failed to create temporary working area")?;
            (scratch.path().to_path_buf(), Some(scratch))
        }
    };

    let invocation = Invocation {
        script,
        node,
        facts,
        modulepath,
        workdir,
        history,
        verbose: cli.verbose > 0,
    };

    let show_steps = cli.report_format == ReportFormat::Human && cli.verbose > 0 && !cli.quiet;
    let result = if show_steps {
        enforce(mode, &invocation, &mut ui::StepProgress::default())
    } else {
        enforce(mode, &invocation, &mut NoProgress)
    };

    if let Some(scratch) = scratch {
        let path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            log::error!("Failed to remove working area {}: {}", path.display(), e);
        }
    }

    let report = result?;
    let outcome = declarative::classify(&report);
    write_report(&report, outcome, cli.report_format, err)?;
    Ok(outcome)
}

fn read_script(cli: &Cli) -> Result<String> {
    match (&cli.script, &cli.manifest) {
        (Some(text), _) if text == "-" => {
            let mut script = String::new();
            std::io::stdin()
                .read_to_string(&mut script)
                .context("Failed to read script from stdin")?;
            Ok(script)
        }
        (Some(text), _) => Ok(text.clone()),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display())),
        (None, None) => bail!("no script given: pass it as an argument, '-' for stdin, or -f PATH"),
    }
}

/// Compile, resolve, materialize, order and enforce
pub fn enforce<P: ProgressCallback>(
    mode: Mode,
    invocation: &Invocation,
    progress: &mut P,
) -> Result<Report> {
    let env = EnvironmentContext::new(&invocation.node, invocation.facts.clone())
        .with_modulepath(invocation.modulepath.clone());

    let parsed = catalog::parse_script(&invocation.script)?;
    let program = catalog::build_program(parsed.ast, parsed.locator);
    let mut compiled = catalog::compile(&program, &env)?;
    log::info!(
        "Compiled catalog for {} with {} resources",
        invocation.node,
        compiled.len()
    );

    let resolution = catalog::resolve_and_replace(&mut compiled, &invocation.facts);
    if !resolution.is_complete() {
        log::warn!(
            "{} deferred value(s) could not be resolved",
            resolution.failures.len()
        );
    }

    let registry = resource::default_registry(&invocation.workdir);
    let plan = ExecutionPlan::new(declarative::materialize(&compiled, &registry)?)?;
    log::debug!("Planned {} resources", plan.total_resources());

    let history = match &invocation.history {
        Some(store) => store.load(&invocation.node).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable sync history: {e:#}");
            SyncHistory::new()
        }),
        None => SyncHistory::new(),
    };

    let options = ExecuteOptions::new(mode, &invocation.node).with_verbose(invocation.verbose);
    let (report, next) = declarative::execute(&plan, &options, &history, progress);

    if mode == Mode::Apply
        && let Some(store) = &invocation.history
        && let Err(e) = store.save(&invocation.node, &next)
    {
        log::error!("Failed to save sync history: {e:#}");
    }

    Ok(report)
}

fn write_report(
    report: &Report,
    outcome: Outcome,
    format: ReportFormat,
    err: &mut dyn Write,
) -> Result<()> {
    match format {
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut *err, report).context("Failed to write report")?;
            writeln!(err)?;
        }
        ReportFormat::Human => ui::render_report(report, outcome, err)?,
    }
    Ok(())
}
