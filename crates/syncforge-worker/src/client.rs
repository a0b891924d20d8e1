//! Controller side of the protocol.
//!
//! [`WorkerClient`] spawns one worker process per request, hands the
//! request over once the worker is `ready`, forwards progress and resolves
//! to the output path or a typed error.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use syncforge_av::ScratchDir;
use syncforge_core::{Config, Error, PipelineRequest, ProgressEvent, Result, RunId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::codec::MessageCodec;
use crate::message::WorkerMessage;

/// How long a worker may linger after its terminal message before it is
/// killed.
const EXIT_GRACE: Duration = Duration::from_secs(10);

/// Spawns and talks to worker processes.
#[derive(Debug, Clone)]
pub struct WorkerClient {
    program: PathBuf,
    args: Vec<String>,
    config_path: Option<PathBuf>,
    scratch: ScratchDir,
}

impl WorkerClient {
    /// `program` is started with `args`, followed by the generated
    /// `worker --run-id <id> --scratch-dir <dir>` arguments.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, scratch: ScratchDir) -> Self {
        Self {
            program: program.into(),
            args,
            config_path: None,
            scratch,
        }
    }

    /// Build a client from configuration. Without an explicit worker
    /// program the running executable is used.
    pub fn from_config(config: &Config) -> Result<Self> {
        let program = match &config.worker.program {
            Some(program) => program.clone(),
            None => std::env::current_exe()?,
        };
        let mut client = Self::new(
            program,
            config.worker.args.clone(),
            ScratchDir::new(&config.scratch.dir),
        );
        client.config_path = config.source.clone();
        Ok(client)
    }

    /// Forward `path` to workers as `--config`.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    fn command(&self, run_id: RunId) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(config) = &self.config_path {
            cmd.arg("--config").arg(config);
        }
        cmd.arg("worker")
            .arg("--run-id")
            .arg(run_id.to_string())
            .arg("--scratch-dir")
            .arg(self.scratch.root());
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run `request` in a fresh worker, passing each progress event to
    /// `on_progress` in arrival order.
    ///
    /// The run's scratch directory is removed once the worker has exited,
    /// whatever the outcome.
    pub async fn run<F>(&self, request: &PipelineRequest, on_progress: F) -> Result<PathBuf>
    where
        F: FnMut(ProgressEvent) + Send,
    {
        let run_id = RunId::new();
        let mut child = self.command(run_id).spawn().map_err(|e| {
            Error::worker(
                format!("failed to spawn worker {}: {e}", self.program.display()),
                None,
            )
        })?;
        tracing::info!(run = %run_id, pid = ?child.id(), "spawned worker");

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr, run_id));
        }

        let result = converse(&mut child, request, on_progress).await;
        let status = reap(&mut child, result.is_ok()).await;
        tracing::debug!(run = %run_id, ?status, "worker exited");

        self.scratch.remove_run(run_id);

        match result {
            Ok(Some(path)) => Ok(path),
            Ok(None) => Err(Error::Protocol(format!(
                "worker closed its output without a result ({})",
                describe_exit(status)
            ))),
            Err(e) => Err(e),
        }
    }
}

/// Exchange messages until a terminal frame or end of stream.
///
/// `Ok(None)` means stdout closed without a terminal frame.
async fn converse<F>(
    child: &mut Child,
    request: &PipelineRequest,
    mut on_progress: F,
) -> Result<Option<PathBuf>>
where
    F: FnMut(ProgressEvent) + Send,
{
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Internal("worker stdout not captured".into()))?;
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| Error::Internal("worker stdin not captured".into()))?;

    let mut frames = FramedRead::new(stdout, MessageCodec::new());
    let mut sink = FramedWrite::new(stdin, MessageCodec::new());
    let mut ready = false;

    while let Some(frame) = frames.next().await {
        match frame? {
            WorkerMessage::Ready if ready => {
                tracing::warn!("Ignoring duplicate ready from worker");
            }
            WorkerMessage::Ready => {
                ready = true;
                sink.send(WorkerMessage::Start {
                    payload: request.clone(),
                })
                .await?;
            }
            WorkerMessage::Start { .. } => {
                return Err(Error::Protocol("worker sent a start message".into()));
            }
            message @ WorkerMessage::Progress { .. } => {
                if !ready {
                    return Err(Error::Protocol(
                        "worker sent progress before ready".into(),
                    ));
                }
                if let Some(event) = message.into_progress_event() {
                    on_progress(event);
                }
            }
            WorkerMessage::Complete { output_path } => return Ok(Some(output_path)),
            WorkerMessage::Error { error, stack } => return Err(Error::worker(error, stack)),
        }
    }
    Ok(None)
}

/// Wait for the worker to exit. Workers that finished cleanly get a grace
/// period; anything else is killed right away.
async fn reap(child: &mut Child, clean: bool) -> Option<ExitStatus> {
    if clean {
        if let Ok(status) = tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            return status.ok();
        }
        tracing::warn!("Worker did not exit within {EXIT_GRACE:?}; killing it");
    } else if let Ok(Some(status)) = child.try_wait() {
        return Some(status);
    }

    if let Err(e) = child.kill().await {
        tracing::warn!("Failed to kill worker: {e}");
    }
    child.wait().await.ok()
}

fn describe_exit(status: Option<ExitStatus>) -> String {
    match status.and_then(|s| s.code()) {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

async fn drain_stderr(stderr: ChildStderr, run_id: RunId) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::debug!(target: "worker", run = %run_id, "{line}"),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(target: "worker", run = %run_id, "stderr closed: {e}");
                break;
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn completes_with_output_path() {
        let tmp = tempfile::tempdir().unwrap();
        let client = script_client(tmp.path(), FAKE_WORKER);
        let mut events = Vec::new();

        let path = client
            .run(&request(tmp.path(), "out.mp4"), |e| events.push(e))
            .await
            .unwrap();

        assert_eq!(path, tmp.path().join("out.mp4"));
        assert!(path.exists());
        let pairs: Vec<_> = events.iter().map(|e| (e.stage, e.progress)).collect();
        assert_eq!(pairs, vec![(1, 0), (1, 100)]);
    }

    #[tokio::test]
    async fn worker_error_is_reported_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let client = script_client(tmp.path(), FAKE_WORKER);
        let mut events = Vec::new();

        let err = client
            .run(&request(tmp.path(), "FAILME.mp4"), |e| events.push(e))
            .await
            .unwrap_err();

        assert_matches!(err, Error::Worker { ref message, ref stack } if message == "boom" && stack.as_deref() == Some("trace"));
        assert_eq!(err.to_string(), "boom");
        assert!(events.last().unwrap().is_failure());
    }

    #[tokio::test]
    async fn exit_without_result_is_a_protocol_error() {
        let tmp = tempfile::tempdir().unwrap();
        let client = script_client(tmp.path(), "echo '{\"type\":\"ready\"}'\nread -r line\nexit 3\n");

        let err = client
            .run(&request(tmp.path(), "out.mp4"), |_| {})
            .await
            .unwrap_err();
        assert_matches!(err, Error::Protocol(ref msg) if msg.contains("exit code 3"));
    }

    #[tokio::test]
    async fn progress_before_ready_is_a_protocol_error() {
        let tmp = tempfile::tempdir().unwrap();
        let client = script_client(
            tmp.path(),
            "echo '{\"type\":\"progress\",\"stage\":1,\"progress\":0,\"message\":\"x\"}'\nsleep 5\n",
        );

        let err = client
            .run(&request(tmp.path(), "out.mp4"), |_| {})
            .await
            .unwrap_err();
        assert_matches!(err, Error::Protocol(ref msg) if msg.contains("before ready"));
    }

    #[tokio::test]
    async fn start_carries_the_request_after_ready() {
        let tmp = tempfile::tempdir().unwrap();
        let script = r#"
echo '{"type":"ready"}'
read -r line
case "$line" in
  *'"type":"start"'*'"artist":"A"'*) echo '{"type":"complete","outputPath":"/done.mp4"}' ;;
  *) echo '{"type":"error","error":"unexpected first frame"}'; exit 1 ;;
esac
"#;
        let client = script_client(tmp.path(), script);
        let path = client
            .run(&request(tmp.path(), "out.mp4"), |_| {})
            .await
            .unwrap();
        assert_eq!(path, PathBuf::from("/done.mp4"));
    }

    #[tokio::test]
    async fn spawn_failure_is_a_worker_error() {
        let tmp = tempfile::tempdir().unwrap();
        let client = WorkerClient::new(
            tmp.path().join("missing-binary"),
            Vec::new(),
            ScratchDir::new(tmp.path().join("scratch")),
        );
        let err = client
            .run(&request(tmp.path(), "out.mp4"), |_| {})
            .await
            .unwrap_err();
        assert_matches!(err, Error::Worker { ref message, .. } if message.contains("failed to spawn"));
    }
}
