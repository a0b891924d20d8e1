//! Builder for executing external tool commands with timeout support.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use syncforge_core::{Error, Result};
use tokio::process::Command;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Tail of stderr kept in error messages.
const MAX_DIAGNOSTIC_CHARS: usize = 4000;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for one external tool invocation.
///
/// Arguments are passed as an argument vector, never through a shell, and
/// paths reach the child byte for byte even when they are not UTF-8. A
/// command may declare the file it is expected to produce with
/// [`expect_output`](Self::expect_output); a zero exit without that file is
/// reported as [`Error::ArtifactMissing`], distinct from a non-zero exit.
///
/// # Example
///
/// ```no_run
/// use syncforge_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> syncforge_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "quiet", "-print_format", "json", "-show_format"])
///     .arg("/path/to/video.mp4")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Duration,
    envs: Vec<(String, String)>,
    expected_output: Option<PathBuf>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            envs: Vec::new(),
            expected_output: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<OsString>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append a path argument.
    pub fn path_arg(&mut self, p: &Path) -> &mut Self {
        self.args.push(p.as_os_str().to_os_string());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<OsString>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Set an environment variable for the child.
    pub fn env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Declare the file this invocation must produce.
    pub fn expect_output(&mut self, path: &Path) -> &mut Self {
        self.expected_output = Some(path.to_path_buf());
        self
    }

    /// The arguments collected so far.
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Short name of the program, used in errors and logs.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`Error::Tool`] if spawning fails, the process times out (message
    ///   includes the timeout), or it exits non-zero (message includes the
    ///   tail of stderr).
    /// - [`Error::ArtifactMissing`] if it exits zero but the declared output
    ///   does not exist.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let program_name = self.program_name();
        tracing::debug!(tool = %program_name, args = ?self.args, "executing");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        cmd.stdin(std::process::Stdio::null());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        // Dropping the wait future on timeout must not leave the tool running.
        cmd.kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        let result = tokio::time::timeout(self.timeout, child.wait_with_output()).await;

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(Error::tool(
                    &program_name,
                    format!("I/O error waiting for process: {e}"),
                ))
            }
            Err(_elapsed) => {
                return Err(Error::tool(
                    &program_name,
                    format!("timed out after {:?}", self.timeout),
                ))
            }
        };

        let tool_output = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !output.status.success() {
            return Err(Error::tool(
                &program_name,
                format!(
                    "exited with status {}: {}",
                    output.status,
                    diagnostic_tail(&tool_output)
                ),
            ));
        }

        if let Some(expected) = &self.expected_output {
            if !expected.exists() {
                return Err(Error::artifact_missing(&program_name, expected));
            }
        }

        Ok(tool_output)
    }
}

/// The last part of stderr (or stdout when stderr is empty).
fn diagnostic_tail(output: &ToolOutput) -> String {
    let text = if output.stderr.trim().is_empty() {
        output.stdout.trim()
    } else {
        output.stderr.trim()
    };
    let char_count = text.chars().count();
    if char_count <= MAX_DIAGNOSTIC_CHARS {
        return text.to_string();
    }
    let tail: String = text.chars().skip(char_count - MAX_DIAGNOSTIC_CHARS).collect();
    format!("...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn sh(script: &str) -> ToolCommand {
        let mut cmd = ToolCommand::new(PathBuf::from("/bin/sh"));
        cmd.args(["-c", script]);
        cmd
    }

    #[tokio::test]
    async fn execute_echo() {
        let output = sh("echo hello").execute().await.unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn nonexistent_tool_is_tool_error() {
        let result = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .execute()
            .await;
        assert_matches!(result, Err(Error::Tool { message, .. }) if message.contains("failed to spawn"));
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let result = sh("echo 'Invalid data found' >&2; exit 3").execute().await;
        assert_matches!(
            result,
            Err(Error::Tool { tool, message }) if tool == "sh" && message.contains("Invalid data found")
        );
    }

    #[tokio::test]
    async fn timeout_fires() {
        let result = sh("sleep 10")
            .timeout(Duration::from_millis(100))
            .execute()
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), "ExternalToolError");
        assert!(err.to_string().contains("timed out"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn zero_exit_without_declared_output_is_artifact_missing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("never_written.mp4");
        let result = sh("exit 0").expect_output(&out).execute().await;
        assert_matches!(result, Err(Error::ArtifactMissing { path, .. }) if path == out);
    }

    #[tokio::test]
    async fn declared_output_present_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("written.mp4");
        let script = format!("printf x > '{}'", out.display());
        sh(&script).expect_output(&out).execute().await.unwrap();
        assert!(out.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_utf8_paths_reach_the_tool_unchanged() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join(OsStr::from_bytes(b"clip-\xff.mp4"));
        let mut cmd = sh("printf x > \"$0\"");
        cmd.path_arg(&out).expect_output(&out);
        assert_eq!(cmd.get_args().last(), Some(&out.as_os_str().to_os_string()));

        cmd.execute().await.unwrap();
        assert!(out.exists());
    }

    #[test]
    fn diagnostic_tail_truncates_long_stderr() {
        let output = ToolOutput {
            status: std::process::Command::new("true").status().unwrap(),
            stdout: String::new(),
            stderr: "x".repeat(MAX_DIAGNOSTIC_CHARS + 10),
        };
        let tail = diagnostic_tail(&output);
        assert!(tail.starts_with("..."));
        assert_eq!(tail.len(), MAX_DIAGNOSTIC_CHARS + 3);
    }
}
