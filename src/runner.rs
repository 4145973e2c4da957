use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Stdio};

/// Exit status and captured output of a shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Run a command line through `sh -c` in `cwd` and capture its output
pub fn run_shell(command: &str, cwd: &Path) -> Result<ShellOutput> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute: {command}"))?;

    Ok(ShellOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
    })
}

/// Run a shell command silently, returning success/failure
pub fn run_quiet(command: &str, cwd: &Path) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Run a program and capture trimmed stdout, failing on a non-zero exit
pub fn run_capture(cmd: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(cmd)
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Command failed: {}", stderr.trim())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_run_shell_captures_output_and_code() {
        let dir = TempDir::new().unwrap();
        let output = run_shell("echo hello; echo oops >&2; exit 3", dir.path()).unwrap();
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout, "hello");
        assert_eq!(output.stderr, "oops");
    }

    #[test]
    fn test_run_shell_uses_cwd() {
        let dir = TempDir::new().unwrap();
        run_shell("touch marker", dir.path()).unwrap();
        assert!(dir.path().join("marker").exists());
    }

    #[test]
    fn test_run_quiet() {
        let dir = TempDir::new().unwrap();
        assert!(run_quiet("true", dir.path()));
        assert!(!run_quiet("false", dir.path()));
    }

    #[test]
    fn test_run_capture() {
        assert_eq!(run_capture("echo", &["  hi  "]).unwrap(), "hi");
        assert!(run_capture("sh", &["-c", "exit 1"]).is_err());
    }
}
