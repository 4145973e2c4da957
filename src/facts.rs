//! Fact collection for the local node

use anyhow::{Context, Result, bail};
use catalog::{FactSet, Value};
use std::fs;
use std::path::Path;

/// Collect core facts about this machine
pub fn collect() -> FactSet {
    let mut facts = FactSet::new();

    let hostname = hostname();
    facts.insert("hostname", hostname.as_str());
    facts.insert_path("os.family", os_family());
    facts.insert_path("os.name", std::env::consts::OS);
    facts.insert("architecture", std::env::consts::ARCH);
    if let Some(kernel) = kernel() {
        facts.insert("kernel", kernel);
    }
    let processors = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    facts.insert_path("processors.count", processors as i64);
    if let Some(user) = user() {
        facts.insert_path("identity.user", user);
    }
    if let Ok(path) = std::env::var("PATH") {
        facts.insert("path", path);
    }

    log::debug!("Collected {} facts for {}", facts.len(), hostname);
    facts
}

/// Load external facts from a `.json` or `.toml` file. The top level must be
/// a table of fact names.
pub fn load_file(path: &Path) -> Result<FactSet> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read facts file {}", path.display()))?;

    let json: serde_json::Value = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?,
        Some("toml") => {
            let table: toml::Table = toml::from_str(&content)
                .with_context(|| format!("Invalid TOML in {}", path.display()))?;
            serde_json::to_value(table).context("Could not convert TOML facts")?
        }
        _ => bail!(
            "Unsupported facts file {}: expected .json or .toml",
            path.display()
        ),
    };

    match Value::from_json(json) {
        Value::Hash(entries) => Ok(FactSet::from(entries)),
        other => bail!(
            "Facts file {} must contain a table, found {}",
            path.display(),
            other.type_name()
        ),
    }
}

/// Synthetic node identity when none is configured: `node-` plus a short
/// digest of the hostname
pub fn synthetic_node_name(facts: &FactSet) -> String {
    let seed = facts
        .get("hostname")
        .and_then(Value::as_str)
        .unwrap_or("localhost");
    let digest = blake3::hash(seed.as_bytes()).to_hex();
    format!("node-{}", &digest[..12])
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .or_else(|| crate::runner::run_capture("hostname", &[]).ok())
        .unwrap_or_else(|| "localhost".to_string())
}

fn os_family() -> &'static str {
    match std::env::consts::OS {
        "macos" => "Darwin",
        "windows" => "windows",
        "linux" => "Linux",
        _ => std::env::consts::FAMILY,
    }
}

fn kernel() -> Option<String> {
    if cfg!(windows) {
        return Some("windows".to_string());
    }
    crate::runner::run_capture("uname", &["-s"]).ok()
}

fn user() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|u| !u.is_empty())
        .or_else(|| crate::runner::run_capture("id", &["-un"]).ok())
}
