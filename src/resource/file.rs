//! File resource - files, directories and symlinks

use anyhow::{Context, Result, bail};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::{ApplyContext, ApplyResult, BoxedResource, Provider, Resource, ResourceSpec, ResourceState};

const PARAMETERS: &[&str] = &["path", "ensure", "content", "target", "mode"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensure {
    /// Anything may exist at the path; an empty file is created when nothing does
    Present,
    File,
    Directory,
    Link,
    Absent,
}

impl FromStr for Ensure {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "present" => Ok(Self::Present),
            "file" => Ok(Self::File),
            "directory" => Ok(Self::Directory),
            "link" => Ok(Self::Link),
            "absent" => Ok(Self::Absent),
            other => bail!(
                "invalid ensure '{other}': expected present, file, directory, link or absent"
            ),
        }
    }
}

impl fmt::Display for Ensure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Present => "present",
            Self::File => "file",
            Self::Directory => "directory",
            Self::Link => "link",
            Self::Absent => "absent",
        };
        f.write_str(s)
    }
}

/// A managed filesystem entry
#[derive(Debug, Clone)]
pub struct File {
    pub path: PathBuf,
    pub ensure: Ensure,
    pub content: Option<String>,
    /// Link target, for `ensure => link`
    pub target: Option<PathBuf>,
    /// Permission bits; ignored where the platform has none
    pub mode: Option<u32>,
}

/// What is on disk at the path
#[derive(Debug)]
enum Observed {
    Missing,
    File { content: Vec<u8>, mode: u32 },
    Directory { mode: u32 },
    Link(PathBuf),
}

impl File {
    pub fn new(path: impl Into<PathBuf>, ensure: Ensure) -> Self {
        Self {
            path: path.into(),
            ensure,
            content: None,
            target: None,
            mode: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    fn observe(&self) -> Result<Observed> {
        let metadata = match fs::symlink_metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Observed::Missing),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to inspect {}", self.path.display()));
            }
        };

        if metadata.file_type().is_symlink() {
            let target = fs::read_link(&self.path).context("Failed to read symlink")?;
            return Ok(Observed::Link(target));
        }
        let mode = permission_bits(&metadata);
        if metadata.is_dir() {
            return Ok(Observed::Directory { mode });
        }
        let content = fs::read(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        Ok(Observed::File { content, mode })
    }

    /// Describe the observed entry using only the attributes this resource manages
    fn project(&self, observed: &Observed) -> ResourceState {
        let mut parts = Vec::new();
        match observed {
            Observed::Missing => return ResourceState::Absent,
            Observed::File { content, mode } => {
                if self.ensure != Ensure::Present {
                    parts.push("file".to_string());
                }
                if self.content.is_some() {
                    parts.push(format!("content {}", content_digest(content)));
                }
                if self.mode.is_some() && cfg!(unix) {
                    parts.push(format!("mode {mode:04o}"));
                }
            }
            Observed::Directory { mode } => {
                if self.ensure != Ensure::Present {
                    parts.push("directory".to_string());
                }
                if self.mode.is_some() && cfg!(unix) {
                    parts.push(format!("mode {mode:04o}"));
                }
            }
            Observed::Link(actual) => {
                if self.ensure != Ensure::Present {
                    match &self.target {
                        Some(target) if link_points_to(&self.path, actual, target) => {
                            parts.push(format!("link to {}", target.display()));
                        }
                        _ => parts.push(format!("link to {}", actual.display())),
                    }
                }
            }
        }
        details(parts)
    }

    fn desired(&self) -> ResourceState {
        let mut parts = Vec::new();
        match self.ensure {
            Ensure::Absent => return ResourceState::Absent,
            Ensure::Present => {}
            Ensure::File => parts.push("file".to_string()),
            Ensure::Directory => parts.push("directory".to_string()),
            Ensure::Link => {
                let target = self.target.as_deref().unwrap_or_else(|| Path::new(""));
                parts.push(format!("link to {}", target.display()));
            }
        }
        if let Some(content) = &self.content {
            parts.push(format!("content {}", content_digest(content.as_bytes())));
        }
        if let Some(mode) = self.mode
            && cfg!(unix)
            && self.ensure != Ensure::Link
        {
            parts.push(format!("mode {mode:04o}"));
        }
        details(parts)
    }

    fn write_file(&self, observed: &Observed, ctx: &ApplyContext) -> Result<ApplyResult> {
        let existed = match observed {
            Observed::Missing => false,
            Observed::Directory { .. } if self.ensure == Ensure::Present => {
                self.set_mode()?;
                return Ok(ApplyResult::Modified);
            }
            Observed::Directory { .. } => {
                bail!("{} is a directory", self.path.display());
            }
            Observed::Link(_) if self.ensure == Ensure::Present => {
                return Ok(ApplyResult::NoChange);
            }
            Observed::Link(_) => {
                fs::remove_file(&self.path).with_context(|| {
                    format!("Failed to remove existing symlink: {}", self.path.display())
                })?;
                true
            }
            Observed::File { .. } => true,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create parent directory: {}", parent.display())
            })?;
        }

        match (&self.content, observed) {
            (Some(content), Observed::File { content: old, .. }) => {
                if old.as_slice() != content.as_bytes() {
                    log_content_diff(&self.path, old, content, ctx.verbose);
                    self.write(content)?;
                }
            }
            (Some(content), _) => self.write(content)?,
            (None, Observed::File { .. }) => {}
            (None, _) => self.write("")?,
        }
        self.set_mode()?;

        Ok(if existed {
            ApplyResult::Modified
        } else {
            ApplyResult::Created
        })
    }

    fn write(&self, content: &str) -> Result<()> {
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    fn create_directory(&self, observed: &Observed) -> Result<ApplyResult> {
        let result = match observed {
            Observed::Missing => {
                fs::create_dir_all(&self.path).with_context(|| {
                    format!("Failed to create directory: {}", self.path.display())
                })?;
                ApplyResult::Created
            }
            Observed::Directory { .. } => ApplyResult::Modified,
            Observed::File { .. } | Observed::Link(_) => {
                bail!("{} exists and is not a directory", self.path.display());
            }
        };
        self.set_mode()?;
        Ok(result)
    }

    fn create_link(&self, observed: &Observed) -> Result<ApplyResult> {
        let Some(target) = &self.target else {
            bail!("ensure => link requires a target");
        };

        let result = match observed {
            Observed::Missing => ApplyResult::Created,
            Observed::Link(_) => {
                fs::remove_file(&self.path).with_context(|| {
                    format!("Failed to remove existing symlink: {}", self.path.display())
                })?;
                ApplyResult::Modified
            }
            // Don't overwrite existing files automatically
            Observed::File { .. } | Observed::Directory { .. } => {
                return Ok(ApplyResult::Skipped {
                    reason: format!("{} exists and is not a link", self.path.display()),
                });
            }
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create parent directory: {}", parent.display())
            })?;
        }
        symlink(target, &self.path)?;
        Ok(result)
    }

    fn remove(&self, observed: &Observed) -> Result<ApplyResult> {
        match observed {
            Observed::Missing => return Ok(ApplyResult::NoChange),
            Observed::Directory { .. } => fs::remove_dir(&self.path).with_context(|| {
                format!("Failed to remove directory: {}", self.path.display())
            })?,
            Observed::File { .. } | Observed::Link(_) => fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?,
        }
        Ok(ApplyResult::Removed)
    }

    #[cfg(unix)]
    fn set_mode(&self) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        if let Some(mode) = self.mode {
            fs::set_permissions(&self.path, fs::Permissions::from_mode(mode))
                .with_context(|| format!("Failed to set mode on {}", self.path.display()))?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn set_mode(&self) -> Result<()> {
        Ok(())
    }
}

impl Resource for File {
    fn id(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    fn description(&self) -> String {
        match (self.ensure, &self.target) {
            (Ensure::Link, Some(target)) => {
                format!("Symlink {} -> {}", self.path.display(), target.display())
            }
            (ensure, _) => format!("Ensure {} is {}", self.path.display(), ensure),
        }
    }

    fn resource_type(&self) -> &'static str {
        "file"
    }

    fn current_state(&self) -> Result<ResourceState> {
        Ok(self.project(&self.observe()?))
    }

    fn desired_state(&self) -> ResourceState {
        self.desired()
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let observed = self.observe()?;
        match self.ensure {
            Ensure::Present | Ensure::File => self.write_file(&observed, ctx),
            Ensure::Directory => self.create_directory(&observed),
            Ensure::Link => self.create_link(&observed),
            Ensure::Absent => self.remove(&observed),
        }
    }
}

/// Builds [`File`] resources from catalog entries
pub struct FileProvider;

impl Provider for FileProvider {
    fn resource_type(&self) -> &'static str {
        "file"
    }

    fn instantiate(&self, spec: &ResourceSpec) -> Result<BoxedResource> {
        spec.check_known(PARAMETERS)?;

        let path = PathBuf::from(spec.string_or_title("path")?);
        if !path.is_absolute() {
            bail!("path '{}' is not absolute", path.display());
        }
        let content = spec.string("content")?;
        let target = spec.string("target")?;

        let ensure = match spec.string("ensure")? {
            Some(ensure) => ensure.parse()?,
            None if target.is_some() => Ensure::Link,
            None if content.is_some() => Ensure::File,
            None => Ensure::Present,
        };
        let ensure = match ensure {
            Ensure::Present if content.is_some() => Ensure::File,
            other => other,
        };

        if target.is_some() && ensure != Ensure::Link {
            bail!("target requires ensure => link, not {ensure}");
        }
        if ensure == Ensure::Link && target.is_none() {
            bail!("ensure => link requires a target");
        }
        if content.is_some() && ensure != Ensure::File {
            bail!("content cannot be managed with ensure => {ensure}");
        }

        let mut file = File::new(path, ensure);
        if let Some(content) = content {
            file = file.with_content(content);
        }
        if let Some(target) = target {
            file = file.with_target(target);
        }
        if let Some(mode) = spec.string("mode")? {
            file = file.with_mode(parse_mode(&mode)?);
        }
        Ok(Box::new(file))
    }
}

/// Octal permission bits, `"0644"` or `"644"`
fn parse_mode(mode: &str) -> Result<u32> {
    let bits = u32::from_str_radix(mode, 8).with_context(|| format!("invalid mode '{mode}'"))?;
    if bits > 0o7777 {
        bail!("invalid mode '{mode}'");
    }
    Ok(bits)
}

fn details(parts: Vec<String>) -> ResourceState {
    ResourceState::Present {
        details: (!parts.is_empty()).then(|| parts.join(", ")),
    }
}

fn content_digest(content: &[u8]) -> String {
    blake3::hash(content).to_hex()[..12].to_string()
}

#[cfg(unix)]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(_metadata: &fs::Metadata) -> u32 {
    0
}

/// Whether a link at `link` reading `actual` resolves to `expected`
fn link_points_to(link: &Path, actual: &Path, expected: &Path) -> bool {
    if actual == expected {
        return true;
    }
    let resolve = |p: &Path| {
        let absolute = if p.is_absolute() {
            p.to_path_buf()
        } else {
            link.parent().map_or_else(|| p.to_path_buf(), |dir| dir.join(p))
        };
        absolute.canonicalize().ok()
    };
    matches!((resolve(actual), resolve(expected)), (Some(a), Some(b)) if a == b)
}

fn log_content_diff(path: &Path, old: &[u8], new: &str, verbose: bool) {
    let level = if verbose {
        log::Level::Info
    } else {
        log::Level::Debug
    };
    if !log::log_enabled!(level) {
        return;
    }
    let Ok(old) = std::str::from_utf8(old) else {
        log::log!(level, "{}: binary content replaced", path.display());
        return;
    };

    let diff = similar::TextDiff::from_lines(old, new);
    let mut rendered = String::new();
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            similar::ChangeTag::Delete => "-",
            similar::ChangeTag::Insert => "+",
            similar::ChangeTag::Equal => continue,
        };
        rendered.push_str(&format!("{sign} {change}"));
        if change.missing_newline() {
            rendered.push('\n');
        }
    }
    log::log!(level, "{} content:\n{}", path.display(), rendered.trim_end());
}

fn symlink(target: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    std::os::unix::fs::symlink(target, link).with_context(|| {
        format!(
            "Failed to create symlink: {} -> {}",
            link.display(),
            target.display()
        )
    })?;

    #[cfg(windows)]
    {
        use std::os::windows::fs::{symlink_dir, symlink_file};

        let created = if target.is_dir() {
            symlink_dir(target, link)
        } else {
            symlink_file(target, link)
        };
        created.with_context(|| {
            format!(
                "Failed to create symlink: {} -> {}",
                link.display(),
                target.display()
            )
        })?;
    }

    #[cfg(not(any(unix, windows)))]
    bail!("Symlinks not supported on this platform");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::Value;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn spec(title: &Path, params: &[(&str, &str)]) -> ResourceSpec {
        let parameters: BTreeMap<String, Value> = params
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::from(*v)))
            .collect();
        ResourceSpec::new(title.to_string_lossy(), parameters)
    }

    fn ctx() -> ApplyContext {
        ApplyContext::new(false)
    }

    #[test]
    fn test_missing_file_is_created_with_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub").join("motd");
        let file = File::new(&path, Ensure::File).with_content("hello\n");

        assert_eq!(file.current_state().unwrap(), ResourceState::Absent);
        assert_eq!(file.apply(&mut ctx()).unwrap(), ApplyResult::Created);
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
        assert!(file.in_sync(&file.current_state().unwrap()));
    }

    #[test]
    fn test_content_drift_is_detected_and_fixed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("motd");
        fs::write(&path, "old\n").unwrap();
        let file = File::new(&path, Ensure::File).with_content("new\n");

        let current = file.current_state().unwrap();
        assert!(current.is_present());
        assert!(!file.in_sync(&current));
        assert_eq!(file.apply(&mut ctx()).unwrap(), ApplyResult::Modified);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
    }

    #[test]
    fn test_present_accepts_any_existing_entry() {
        let dir = TempDir::new().unwrap();
        let file = File::new(dir.path(), Ensure::Present);
        assert!(file.in_sync(&file.current_state().unwrap()));

        let missing = File::new(dir.path().join("new"), Ensure::Present);
        assert_eq!(missing.apply(&mut ctx()).unwrap(), ApplyResult::Created);
        assert_eq!(fs::read_to_string(dir.path().join("new")).unwrap(), "");
    }

    #[test]
    fn test_absent_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone");
        fs::write(&path, "x").unwrap();
        let file = File::new(&path, Ensure::Absent);

        assert!(!file.in_sync(&file.current_state().unwrap()));
        assert_eq!(file.apply(&mut ctx()).unwrap(), ApplyResult::Removed);
        assert!(!path.exists());
        assert!(file.in_sync(&file.current_state().unwrap()));
    }

    #[test]
    fn test_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b");
        let file = File::new(&path, Ensure::Directory);
        assert_eq!(file.apply(&mut ctx()).unwrap(), ApplyResult::Created);
        assert!(path.is_dir());
        assert!(file.in_sync(&file.current_state().unwrap()));

        let clash = dir.path().join("plain");
        fs::write(&clash, "").unwrap();
        assert!(File::new(&clash, Ensure::Directory).apply(&mut ctx()).is_err());
    }

    #[test]
    fn test_file_over_directory_fails() {
        let dir = TempDir::new().unwrap();
        let file = File::new(dir.path(), Ensure::File).with_content("x");
        assert!(!file.in_sync(&file.current_state().unwrap()));
        assert!(file.apply(&mut ctx()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_created_and_retargeted() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        fs::write(&first, "1").unwrap();
        fs::write(&second, "2").unwrap();
        let link = dir.path().join("link");

        let resource = File::new(&link, Ensure::Link).with_target(&first);
        assert_eq!(resource.apply(&mut ctx()).unwrap(), ApplyResult::Created);
        assert!(resource.in_sync(&resource.current_state().unwrap()));

        let resource = File::new(&link, Ensure::Link).with_target(&second);
        assert!(!resource.in_sync(&resource.current_state().unwrap()));
        assert_eq!(resource.apply(&mut ctx()).unwrap(), ApplyResult::Modified);
        assert_eq!(fs::read_link(&link).unwrap(), second);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_does_not_replace_regular_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file");
        fs::write(&path, "keep").unwrap();
        let resource = File::new(&path, Ensure::Link).with_target(dir.path());
        assert!(matches!(
            resource.apply(&mut ctx()).unwrap(),
            ApplyResult::Skipped { .. }
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep");
    }

    #[cfg(unix)]
    #[test]
    fn test_mode_is_managed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret");
        fs::write(&path, "s").unwrap();
        fs::set_permissions(&path, std::os::unix::fs::PermissionsExt::from_mode(0o644)).unwrap();

        let file = File::new(&path, Ensure::File).with_mode(0o600);
        assert!(!file.in_sync(&file.current_state().unwrap()));
        file.apply(&mut ctx()).unwrap();
        assert!(file.in_sync(&file.current_state().unwrap()));
        assert_eq!(fs::read_to_string(&path).unwrap(), "s");
    }

    #[test]
    fn test_provider_defaults_and_validation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x");
        let provider = FileProvider;

        let resource = provider.instantiate(&spec(&path, &[("content", "hi")])).unwrap();
        assert_eq!(resource.id(), path.to_string_lossy());
        assert_eq!(
            resource.desired_state(),
            File::new(&path, Ensure::File).with_content("hi").desired_state()
        );

        assert!(provider.instantiate(&spec(Path::new("relative"), &[])).is_err());
        assert!(provider.instantiate(&spec(&path, &[("ensure", "sideways")])).is_err());
        assert!(provider.instantiate(&spec(&path, &[("ensure", "link")])).is_err());
        assert!(provider.instantiate(&spec(&path, &[("ensure", "directory"), ("content", "x")])).is_err());
        assert!(provider.instantiate(&spec(&path, &[("mode", "999")])).is_err());
        assert!(provider.instantiate(&spec(&path, &[("owner", "root")])).is_err());
        assert!(provider.instantiate(&spec(&path, &[("mode", "0640")])).is_ok());
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("0644").unwrap(), 0o644);
        assert_eq!(parse_mode("755").unwrap(), 0o755);
        assert!(parse_mode("8").is_err());
        assert!(parse_mode("17777").is_err());
    }
}
