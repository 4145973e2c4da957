//! Compilation environment: node identity, facts and module path

use crate::facts::FactSet;
use std::path::{Path, PathBuf};

/// Everything a compilation may read about the outside world.
///
/// The environment is read-only; per-compilation state such as loaded module
/// files lives in the compiler.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentContext {
    node: String,
    facts: FactSet,
    modulepath: Vec<PathBuf>,
}

impl EnvironmentContext {
    pub fn new(node: impl Into<String>, facts: FactSet) -> Self {
        Self {
            node: node.into(),
            facts,
            modulepath: Vec::new(),
        }
    }

    /// Directories searched, in order, for module classes
    pub fn with_modulepath(mut self, modulepath: Vec<PathBuf>) -> Self {
        self.modulepath = modulepath;
        self
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn facts(&self) -> &FactSet {
        &self.facts
    }

    pub fn modulepath(&self) -> &[PathBuf] {
        &self.modulepath
    }

    /// First manifest on the module path that would define `class_name`
    pub fn find_manifest(&self, class_name: &str) -> Option<PathBuf> {
        let relative = manifest_path(class_name)?;
        self.modulepath
            .iter()
            .map(|dir| dir.join(&relative))
            .find(|path| path.is_file())
    }
}

/// `foo` lives in `foo/manifests/init.pp`, `foo::bar::baz` in
/// `foo/manifests/bar/baz.pp`
fn manifest_path(class_name: &str) -> Option<PathBuf> {
    let mut segments = class_name.split("::");
    let module = segments.next().filter(|m| !m.is_empty())?;
    let rest: Vec<&str> = segments.collect();

    let mut path = Path::new(module).join("manifests");
    match rest.split_last() {
        None => path.push("init.pp"),
        Some((last, dirs)) => {
            for dir in dirs {
                path.push(dir);
            }
            path.push(format!("{last}.pp"));
        }
    }
    Some(path)
}
