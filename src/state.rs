//! Persistent state between runs: the sync history

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use declarative::SyncHistory;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const HISTORY_FILE: &str = "history.json";

/// On-disk form of the sync history
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HistoryFile {
    /// Node the history was recorded for
    pub node: String,

    /// Digest of the last converged desired state per resource
    #[serde(default)]
    pub resources: SyncHistory,

    /// Last time the history was written
    pub last_updated: DateTime<Utc>,
}

/// Reads and writes `history.json` in a state directory
#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    /// Load the history for `node`, or an empty one when there is none.
    ///
    /// A history recorded for a different node is ignored.
    pub fn load(&self, node: &str) -> Result<SyncHistory> {
        let path = self.path();
        if !path.exists() {
            log::debug!("History file does not exist, starting empty");
            return Ok(SyncHistory::new());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read history file: {}", path.display()))?;
        let file: HistoryFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse history file: {}", path.display()))?;

        if file.node != node {
            log::info!(
                "History in {} belongs to node '{}', ignoring it",
                path.display(),
                file.node
            );
            return Ok(SyncHistory::new());
        }

        log::debug!("Loaded {} history entries from {}", file.resources.len(), path.display());
        Ok(file.resources)
    }

    pub fn save(&self, node: &str, history: &SyncHistory) -> Result<()> {
        ensure_dir(&self.dir)?;
        let file = HistoryFile {
            node: node.to_string(),
            resources: history.clone(),
            last_updated: Utc::now(),
        };
        let content =
            serde_json::to_string_pretty(&file).context("Failed to serialize history to JSON")?;

        let path = self.path();
        fs::write(&path, content)
            .with_context(|| format!("Failed to write history file: {}", path.display()))?;
        log::debug!("Saved history to {}", path.display());
        Ok(())
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create state directory: {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty_history() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path());
        assert!(store.load("web01").unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path().join("nested"));
        let mut history = SyncHistory::new();
        history.record("File[/tmp/a]", "abc");
        store.save("web01", &history).unwrap();

        assert!(store.path().exists());
        assert_eq!(store.load("web01").unwrap(), history);
    }

    #[test]
    fn test_other_node_history_is_ignored() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path());
        let mut history = SyncHistory::new();
        history.record("File[/tmp/a]", "abc");
        store.save("web01", &history).unwrap();

        assert!(store.load("web02").unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path());
        fs::write(store.path(), "not json").unwrap();
        assert!(store.load("web01").is_err());
    }
}
