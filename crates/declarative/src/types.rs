//! Core types for declarative resource management

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a run treats drift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Converge drifted resources
    #[serde(rename = "run")]
    Apply,
    /// Detect drift without touching the system
    #[serde(rename = "observe")]
    Observe,
}

impl Mode {
    pub fn is_observe(self) -> bool {
        self == Self::Observe
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "run" => Ok(Self::Apply),
            "observe" => Ok(Self::Observe),
            other => Err(Error::InvalidMode {
                mode: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply => f.write_str("run"),
            Self::Observe => f.write_str("observe"),
        }
    }
}

/// Current or desired state of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceState {
    /// Resource exists/is configured
    Present { details: Option<String> },
    /// Resource does not exist/is not configured
    Absent,
}

impl ResourceState {
    /// Check if state represents presence
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }

    /// Stable digest of this state, used to recognise a desired state seen before
    pub fn digest(&self) -> String {
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&encoded).to_hex().to_string()
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present { details: Some(details) } => write!(f, "present ({details})"),
            Self::Present { details: None } => f.write_str("present"),
            Self::Absent => f.write_str("absent"),
        }
    }
}

/// Result of applying a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Resource was created
    Created,
    /// Resource was modified
    Modified,
    /// Resource was removed
    Removed,
    /// Apply failed
    Failed { error: String },
    /// Apply was skipped
    Skipped { reason: String },
}

/// Per-resource event recorded in a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Unchanged,
    Changed,
    Restarted,
    Scheduled,
    CorrectiveChange,
    OutOfSync,
    Failed,
    FailedToRestart,
    Skipped,
}

impl EventStatus {
    pub const ALL: [Self; 9] = [
        Self::Unchanged,
        Self::Changed,
        Self::Restarted,
        Self::Scheduled,
        Self::CorrectiveChange,
        Self::OutOfSync,
        Self::Failed,
        Self::FailedToRestart,
        Self::Skipped,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Changed => "changed",
            Self::Restarted => "restarted",
            Self::Scheduled => "scheduled",
            Self::CorrectiveChange => "corrective_change",
            Self::OutOfSync => "out_of_sync",
            Self::Failed => "failed",
            Self::FailedToRestart => "failed_to_restart",
            Self::Skipped => "skipped",
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::FailedToRestart)
    }

    pub fn is_change(self) -> bool {
        matches!(
            self,
            Self::Restarted | Self::Changed | Self::OutOfSync | Self::Scheduled | Self::CorrectiveChange
        )
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Observe only, or converge
    pub mode: Mode,
    /// Node the catalog was compiled for
    pub node: String,
    /// Verbose output
    pub verbose: bool,
}

impl ExecuteOptions {
    pub fn new(mode: Mode, node: impl Into<String>) -> Self {
        Self {
            mode,
            node: node.into(),
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
