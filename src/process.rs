#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Running the grading harness as a child process with a deadline.

use std::{
    ffi::{OsStr, OsString},
    path::Path,
    process::{ExitStatus, Stdio},
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use tokio::{
    io::{AsyncRead, AsyncReadExt, BufReader},
    process::{Child, Command},
    sync::Mutex,
    task::JoinHandle,
    time::timeout,
};

use crate::error::HarnessError;

/// Drop guard that kills the child if it is abandoned before exiting, so a
/// timed-out harness does not outlive its run.
struct ChildDropGuard(Option<Child>);

impl ChildDropGuard {
    /// Wraps the provided child process with the drop guard.
    fn new(child: Child) -> Self {
        Self(Some(child))
    }

    /// Returns a mutable reference to the underlying child process.
    fn child_mut(&mut self) -> anyhow::Result<&mut Child> {
        self.0
            .as_mut()
            .context("child process already taken from guard")
    }

    /// Prevents the guard from killing the process on drop.
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for ChildDropGuard {
    fn drop(&mut self) {
        if let Some(child) = self.0.as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// Captured result of a finished subprocess.
#[derive(Debug)]
pub struct Collected {
    /// Exit status returned by the process.
    pub status: ExitStatus,
    /// Contents written to stdout.
    pub stdout: Vec<u8>,
    /// Contents written to stderr.
    pub stderr: Vec<u8>,
}

/// Output captured from one pipe, shared with the task reading it.
type SharedBuf = Arc<Mutex<Vec<u8>>>;

/// Reads `stream` into `sink` chunk by chunk until it closes, so whatever
/// arrived is still in `sink` if the task is aborted.
fn spawn_reader<R>(
    stream: R,
    sink: SharedBuf,
    what: &'static str,
) -> JoinHandle<anyhow::Result<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut chunk = [0u8; 4096];
        loop {
            let read = reader
                .read(&mut chunk)
                .await
                .with_context(|| format!("failed to read {what}"))?;
            if read == 0 {
                return Ok(());
            }
            sink.lock().await.extend_from_slice(&chunk[..read]);
        }
    })
}

/// Spawns `program` with `args` in `cwd`, stdin closed, and collects both
/// output streams.
///
/// When `deadline` elapses first the child is killed and
/// [`HarnessError::Timeout`] is returned with the stderr read so far.
pub async fn run_collect(
    program: impl AsRef<OsStr>,
    args: &[OsString],
    cwd: &Path,
    deadline: Duration,
) -> Result<Collected, HarnessError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut guard = ChildDropGuard::new(cmd.spawn().context("failed to spawn harness")?);

    let stdout = guard
        .child_mut()?
        .stdout
        .take()
        .context("missing stdout pipe")?;
    let stderr = guard
        .child_mut()?
        .stderr
        .take()
        .context("missing stderr pipe")?;

    let out_buf = SharedBuf::default();
    let err_buf = SharedBuf::default();
    let mut out_task = spawn_reader(stdout, Arc::clone(&out_buf), "stdout");
    let mut err_task = spawn_reader(stderr, Arc::clone(&err_buf), "stderr");

    let finished = timeout(deadline, async {
        let status = guard
            .child_mut()?
            .wait()
            .await
            .context("failed to wait on harness")?;
        (&mut out_task).await.context("stdout task join error")??;
        (&mut err_task).await.context("stderr task join error")??;
        Ok::<ExitStatus, anyhow::Error>(status)
    })
    .await;

    match finished {
        Ok(status) => {
            let status = status?;
            guard.disarm();
            Ok(Collected {
                status,
                stdout: std::mem::take(&mut *out_buf.lock().await),
                stderr: std::mem::take(&mut *err_buf.lock().await),
            })
        }
        Err(_) => {
            drop(guard);
            out_task.abort();
            err_task.abort();
            let stderr = String::from_utf8_lossy(&err_buf.lock().await).to_string();
            Err(HarnessError::Timeout {
                limit: deadline,
                stderr,
            })
        }
    }
}
