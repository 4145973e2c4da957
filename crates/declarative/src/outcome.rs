//! Reduce a report to a single verdict

use crate::report::{Report, ResourceEvent};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Nothing drifted
    Conformed,
    /// Something changed, drifted or was scheduled
    Changes,
    /// Something failed
    Failures,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conformed => f.write_str("conformed"),
            Self::Changes => f.write_str("changes"),
            Self::Failures => f.write_str("failures"),
        }
    }
}

pub fn classify(report: &Report) -> Outcome {
    classify_events(report.events())
}

/// Failures dominate changes, changes dominate conformance. Zero counts,
/// `unchanged` and `skipped` never affect the verdict.
pub fn classify_events<'a>(events: impl IntoIterator<Item = &'a ResourceEvent>) -> Outcome {
    let mut changes = false;
    for event in events {
        if event.count == 0 {
            continue;
        }
        if event.status.is_failure() {
            return Outcome::Failures;
        }
        changes |= event.status.is_change();
    }
    if changes {
        Outcome::Changes
    } else {
        Outcome::Conformed
    }
}
