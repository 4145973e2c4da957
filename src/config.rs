//! User configuration: `<config_dir>/config.toml`
//!
//! ```toml
//! modulepath = ["~/.attune/modules", "/srv/attune/modules"]
//! node = "web01"
//! facts_file = "~/.attune/facts.toml"
//! workdir = "/var/tmp/attune"
//! history = true
//! ```
//!
//! Every key is optional. Command line flags take precedence.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directories searched for modules, in order
    #[serde(default)]
    pub modulepath: Vec<String>,

    /// Node identity
    #[serde(default)]
    pub node: Option<String>,

    /// External facts merged over the collected ones
    #[serde(default)]
    pub facts_file: Option<String>,

    /// Working area; a temporary directory when unset
    #[serde(default)]
    pub workdir: Option<String>,

    /// Whether to read and write sync history
    #[serde(default = "default_history")]
    pub history: bool,
}

fn default_history() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            modulepath: Vec::new(),
            node: None,
            facts_file: None,
            workdir: None,
            history: default_history(),
        }
    }
}

impl Config {
    /// Load config.toml from `dir`, or defaults if it doesn't exist
    pub fn load_from(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("Invalid {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Configured module path with `~` and variables expanded
    pub fn modulepath(&self) -> Vec<PathBuf> {
        self.modulepath
            .iter()
            .map(|dir| crate::paths::expand(dir))
            .collect()
    }

    pub fn facts_file(&self) -> Option<PathBuf> {
        self.facts_file.as_deref().map(crate::paths::expand)
    }

    pub fn workdir(&self) -> Option<PathBuf> {
        self.workdir.as_deref().map(crate::paths::expand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(dir.path()).unwrap();
        assert!(config.modulepath.is_empty());
        assert!(config.node.is_none());
        assert!(config.history);
    }

    #[test]
    fn test_load_config() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
modulepath = ["/srv/modules", "~/modules"]
node = "web01"
history = false
"#,
        )
        .unwrap();

        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config.node.as_deref(), Some("web01"));
        assert!(!config.history);
        let home = dirs::home_dir().unwrap();
        assert_eq!(
            config.modulepath(),
            vec![PathBuf::from("/srv/modules"), home.join("modules")]
        );
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "colour = \"blue\"\n").unwrap();
        assert!(Config::load_from(dir.path()).is_err());
    }
}
