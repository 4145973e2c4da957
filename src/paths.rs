//! Path resolution for attune
//!
//! # Environment Variables
//!
//! - `ATTUNE_CONFIG_DIR` - Override config directory
//! - `ATTUNE_STATE_DIR` - Override state directory (sync history)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `ATTUNE_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/attune` (if set)
//! 3. `~/.config/attune`
//!
//! For state_dir():
//! 1. `ATTUNE_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/attune` (if set)
//! 3. `~/.local/state/attune`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "ATTUNE_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "ATTUNE_STATE_DIR";

const APP_DIR: &str = "attune";

/// Get the attune config directory path
pub fn config_dir() -> Result<PathBuf> {
    resolve_config_dir(&process_env)
}

/// Get the attune state directory path
pub fn state_dir() -> Result<PathBuf> {
    resolve_state_dir(&process_env)
}

/// Default module path: `~/.attune/modules`
pub fn default_modulepath() -> Result<Vec<PathBuf>> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(vec![home.join(".attune").join("modules")])
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn resolve_config_dir(env: &dyn Fn(&str) -> Option<String>) -> Result<PathBuf> {
    if let Some(dir) = env(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!("Using config dir from {}: {}", ENV_CONFIG_DIR, path.display());
        return Ok(path);
    }

    if let Some(xdg_config) = env("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join(APP_DIR);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join(APP_DIR);
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

fn resolve_state_dir(env: &dyn Fn(&str) -> Option<String>) -> Result<PathBuf> {
    if let Some(dir) = env(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Some(xdg_state) = env("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join(APP_DIR);
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join(APP_DIR);
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as written.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_dir_env_override() {
        let env = env_of(&[
            (ENV_CONFIG_DIR, "/custom/config/path"),
            ("XDG_CONFIG_HOME", "/xdg"),
        ]);
        assert_eq!(
            resolve_config_dir(&env).unwrap(),
            PathBuf::from("/custom/config/path")
        );
    }

    #[test]
    fn test_config_dir_override_expands_tilde() {
        let home = dirs::home_dir().unwrap();
        let env = env_of(&[(ENV_CONFIG_DIR, "~/dotfiles/attune")]);
        assert_eq!(
            resolve_config_dir(&env).unwrap(),
            home.join("dotfiles").join("attune")
        );
    }

    #[test]
    fn test_xdg_config_home() {
        let env = env_of(&[("XDG_CONFIG_HOME", "/tmp/xdg-config")]);
        assert_eq!(
            resolve_config_dir(&env).unwrap(),
            PathBuf::from("/tmp/xdg-config/attune")
        );
    }

    #[test]
    fn test_default_config_dir() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(
            resolve_config_dir(&env_of(&[])).unwrap(),
            home.join(".config").join("attune")
        );
    }

    #[test]
    fn test_state_dir_resolution() {
        let env = env_of(&[(ENV_STATE_DIR, "/custom/state")]);
        assert_eq!(resolve_state_dir(&env).unwrap(), PathBuf::from("/custom/state"));

        let env = env_of(&[("XDG_STATE_HOME", "/tmp/xdg-state")]);
        assert_eq!(
            resolve_state_dir(&env).unwrap(),
            PathBuf::from("/tmp/xdg-state/attune")
        );

        let home = dirs::home_dir().unwrap();
        assert_eq!(
            resolve_state_dir(&env_of(&[])).unwrap(),
            home.join(".local").join("state").join("attune")
        );
    }

    #[test]
    fn test_expand() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand("~/test/path"), home.join("test").join("path"));
        assert_eq!(expand("/absolute/path"), PathBuf::from("/absolute/path"));
        assert_eq!(
            expand("/path/$NONEXISTENT_ATTUNE_VAR_12345/file"),
            PathBuf::from("/path/$NONEXISTENT_ATTUNE_VAR_12345/file")
        );
    }
}
