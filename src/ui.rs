//! Terminal rendering. Everything here writes to stderr or a given writer;
//! stdout carries only the outcome line.

use colored::Colorize;
use declarative::{EventStatus, Outcome, ProgressCallback, Report, ResourceStatus};
use std::io::{self, Write};

/// Format a step indicator
pub fn step(num: usize, total: usize, msg: &str) -> String {
    format!("{} {}", format!("[{num}/{total}]").blue().bold(), msg)
}

/// Colored single word for an outcome
pub fn outcome_label(outcome: Outcome) -> String {
    let label = outcome.to_string();
    match outcome {
        Outcome::Conformed => label.green().to_string(),
        Outcome::Changes => label.yellow().to_string(),
        Outcome::Failures => label.red().bold().to_string(),
    }
}

fn status_label(status: EventStatus) -> String {
    let label = status.as_str();
    if status.is_failure() {
        label.red().to_string()
    } else if status.is_change() {
        label.yellow().to_string()
    } else {
        label.dimmed().to_string()
    }
}

/// Human summary of a report
pub fn render_report(report: &Report, outcome: Outcome, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w)?;
    let title = format!("Report for {} ({})", report.node, report.mode);
    writeln!(w, "{}", title.bold())?;
    writeln!(w, "{}", "─".repeat(title.chars().count()).dimmed())?;

    for status in &report.resource_statuses {
        render_status(status, w)?;
    }
    if report.resource_statuses.is_empty() {
        writeln!(w, "  {}", "no resources".dimmed())?;
    }

    writeln!(w)?;
    for (resource_type, events) in &report.metrics {
        let counts = events
            .iter()
            .map(|e| format!("{} {}", e.count, status_label(e.status)))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(w, "  {}: {}", resource_type.dimmed(), counts)?;
    }
    writeln!(w, "{} {}", "Outcome:".bold(), outcome_label(outcome))
}

fn render_status(status: &ResourceStatus, w: &mut dyn Write) -> io::Result<()> {
    let symbol = if status.failed() {
        "✗".red()
    } else if status.events.iter().any(|e| e.is_change()) {
        "~".yellow()
    } else {
        "✓".green()
    };
    let events = status
        .events
        .iter()
        .map(|e| status_label(*e))
        .collect::<Vec<_>>()
        .join(", ");
    writeln!(w, "{} {} {}", symbol, status.resource, events)?;
    if let Some(diff) = &status.diff {
        writeln!(w, "    {}", diff.to_string().dimmed())?;
    }
    if let Some(message) = &status.message {
        writeln!(w, "    {}", message.dimmed())?;
    }
    Ok(())
}

/// Prints `[n/total] resource` lines to stderr while resources are evaluated
#[derive(Debug, Default)]
pub struct StepProgress {
    total: usize,
    current: usize,
}

impl ProgressCallback for StepProgress {
    fn on_run_start(&mut self, count: usize) {
        self.total = count;
        self.current = 0;
    }

    fn on_resource_start(&mut self, _id: &str, description: &str) {
        self.current += 1;
        eprintln!("{}", step(self.current, self.total, description));
    }

    fn on_resource_complete(&mut self, _id: &str, _events: &[EventStatus]) {}

    fn on_run_complete(&mut self) {}
}
