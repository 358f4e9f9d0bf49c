//! Rendering-process execution
//!
//! Spawns PhantomJS with a prepared invocation and captures its full
//! stdout/stderr. The script-level timeout passed on the command line is
//! advisory only; the supervisory deadline enforced here is what guarantees
//! the call returns, because PhantomJS can hang past its own timeout on
//! native-layer stalls.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::args::Invocation;
use crate::error::{FetchError, Result};
use crate::protocol::{DEFAULT_PHANTOMJS_BIN, ENV_PHANTOMJS_BIN};

/// Added on top of the script-level timeout to form the supervisory
/// deadline. The script gets this long to shut down on its own after its
/// internal timeout fires.
pub const SUPERVISORY_MARGIN: Duration = Duration::from_secs(30);

/// How long the kill path waits for the capture tasks to observe EOF.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Everything captured from one process run.
#[derive(Debug)]
pub struct RawOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub status: ExitStatus,
}

impl RawOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Process-execution seam; the session only sees this trait.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run one invocation to completion, or kill it at `deadline`.
    /// `None` waits indefinitely.
    async fn run(&self, invocation: &Invocation, deadline: Option<Duration>)
        -> Result<RawOutput>;
}

/// Runs the real PhantomJS binary.
///
/// The binary path is resolved once at construction, not per call.
#[derive(Debug, Clone)]
pub struct PhantomRunner {
    binary: PathBuf,
}

impl PhantomRunner {
    /// Resolve the binary from `PHANTOMJS_BIN`, falling back to the bare
    /// command name looked up via PATH.
    pub fn from_env() -> Self {
        let binary = std::env::var_os(ENV_PHANTOMJS_BIN)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PHANTOMJS_BIN));
        Self { binary }
    }

    /// Use an explicit binary path (tests, vendored installs).
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &PathBuf {
        &self.binary
    }
}

#[async_trait]
impl ProcessRunner for PhantomRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        deadline: Option<Duration>,
    ) -> Result<RawOutput> {
        debug!(binary = %self.binary.display(), ?deadline, "spawning rendering process");

        let mut child = Command::new(&self.binary)
            .args(invocation.to_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Drain both pipes concurrently; payloads can reach megabytes and a
        // full pipe buffer would deadlock the child otherwise.
        let stdout_task = tokio::spawn(drain(child.stdout.take()));
        let stderr_task = tokio::spawn(drain(child.stderr.take()));

        let status = match deadline {
            None => child.wait().await?,
            Some(limit) => match timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!(
                        seconds = limit.as_secs(),
                        "supervisory timeout exceeded, killing rendering process"
                    );
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    let stdout = timeout(DRAIN_GRACE, stdout_task)
                        .await
                        .ok()
                        .and_then(|r| r.ok())
                        .unwrap_or_default();
                    let stderr = timeout(DRAIN_GRACE, stderr_task)
                        .await
                        .ok()
                        .and_then(|r| r.ok())
                        .unwrap_or_default();
                    return Err(FetchError::Timeout {
                        seconds: limit.as_secs(),
                        stdout: String::from_utf8_lossy(&stdout).into_owned(),
                        stderr: String::from_utf8_lossy(&stderr).into_owned(),
                    });
                }
            },
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            // Not fatal: the script may have written a full payload before
            // exiting abnormally. Parsing decides.
            debug!(?status, "rendering process exited non-zero");
        }

        Ok(RawOutput {
            stdout,
            stderr,
            status,
        })
    }
}

async fn drain<R>(pipe: Option<R>) -> Vec<u8>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh_invocation(dir: &tempfile::TempDir, body: &str) -> Invocation {
        let script = dir.path().join("stub.sh");
        std::fs::write(&script, body).unwrap();
        Invocation {
            binary_options: vec![],
            script,
            script_options: vec![],
        }
    }

    #[tokio::test]
    async fn test_captures_stdout_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let inv = sh_invocation(&dir, "printf out; printf err >&2\n");
        let runner = PhantomRunner::with_binary("sh");

        let out = runner.run(&inv, None).await.unwrap();
        assert_eq!(out.stdout, b"out");
        assert_eq!(out.stderr, b"err");
        assert!(out.status.success());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let inv = sh_invocation(&dir, "printf payload; exit 3\n");
        let runner = PhantomRunner::with_binary("sh");

        let out = runner.run(&inv, None).await.unwrap();
        assert_eq!(out.stdout, b"payload");
        assert_eq!(out.status.code(), Some(3));
    }

    #[tokio::test]
    async fn test_deadline_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let inv = sh_invocation(&dir, "printf partial; exec sleep 10\n");
        let runner = PhantomRunner::with_binary("sh");

        let started = Instant::now();
        let err = runner
            .run(&inv, Some(Duration::from_millis(200)))
            .await
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));

        match err {
            FetchError::Timeout { stdout, .. } => assert_eq!(stdout, "partial"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let inv = sh_invocation(&dir, "printf done\n");
        let runner = PhantomRunner::with_binary("sh");

        let out = runner
            .run(&inv, Some(Duration::from_secs(10)))
            .await
            .unwrap();
        assert_eq!(out.stdout, b"done");
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let inv = sh_invocation(&dir, "");
        let runner = PhantomRunner::with_binary("/nonexistent/phantomjs-test-bin");

        let err = runner.run(&inv, None).await.unwrap_err();
        assert!(matches!(err, FetchError::Spawn(_)));
    }

    #[test]
    fn test_from_env_falls_back_to_path_lookup() {
        // Only checks the fallback; the env-var branch would race other
        // tests mutating the process environment.
        if std::env::var_os(ENV_PHANTOMJS_BIN).is_none() {
            let runner = PhantomRunner::from_env();
            assert_eq!(runner.binary(), &PathBuf::from(DEFAULT_PHANTOMJS_BIN));
        }
    }
}
