// Supervised execution of solver subprocesses.
//
// A solve is one supervised run: spawn the child with piped output, then
// race its exit against the watchdog timer and the cancellation token.
// Whichever loses the race, the child never outlives the call.

use crate::domain::models::SolverConfig;
use crate::domain::solver_adapter::{CancelToken, SolverError};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

/// Slack granted on top of the configured time limit before the watchdog
/// kills a solver that did not stop on its own.
pub(crate) const WATCHDOG_GRACE: Duration = Duration::from_secs(2);

/// Watchdog duration for a solve: the configured time limit plus grace,
/// or no watchdog at all when no limit was configured.
pub(crate) fn watchdog_for(config: &SolverConfig) -> Option<Duration> {
    config
        .time_limit
        .filter(|limit| limit.is_finite() && *limit > 0.0)
        .map(|limit| Duration::from_secs_f64(limit) + WATCHDOG_GRACE)
}

/// Outcome of one supervised child process run.
#[derive(Debug)]
pub enum RunOutcome {
    /// Child exited on its own
    Exited {
        code: i32,
        stdout: String,
        stderr: String,
    },
    /// Watchdog fired first; the child was killed
    TimedOut,
    /// Cancellation token fired first; the child was killed
    Cancelled,
}

/// Locate `binary` on PATH, or verify an explicit path exists.
///
/// Spawning would also fail for a missing binary, but this check runs first
/// so the error names the missing dependency instead of a bare ENOENT.
pub fn resolve_binary(binary: &str) -> Result<PathBuf, SolverError> {
    let candidate = Path::new(binary);
    if candidate.components().count() > 1 {
        if candidate.is_file() {
            return Ok(candidate.to_path_buf());
        }
        return Err(SolverError::Spawn(format!(
            "solver executable '{binary}' does not exist"
        )));
    }

    if let Some(paths) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&paths) {
            let full = dir.join(binary);
            if full.is_file() {
                return Ok(full);
            }
        }
    }

    Err(SolverError::Spawn(format!(
        "solver executable '{binary}' was not found on PATH"
    )))
}

/// Run a child process to completion, killing it if the watchdog or the
/// cancellation token fires first. Stdout and stderr are accumulated
/// concurrently so a chatty solver cannot deadlock on a full pipe.
pub async fn run_supervised(
    mut command: Command,
    watchdog: Option<Duration>,
    cancel: &CancelToken,
) -> Result<RunOutcome, SolverError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let program = command.as_std().get_program().to_string_lossy().to_string();
    let mut child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SolverError::Spawn(format!("solver executable '{program}' was not found"))
        } else {
            SolverError::Spawn(format!("failed to spawn '{program}': {e}"))
        }
    })?;

    let stdout_task = tokio::spawn(drain(child.stdout.take()));
    let stderr_task = tokio::spawn(drain(child.stderr.take()));

    let watchdog_timer = async {
        match watchdog {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        status = child.wait() => {
            let status = status?;
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            let code = status.code().unwrap_or(-1);
            debug!(program = %program, code, "solver process exited");
            Ok(RunOutcome::Exited { code, stdout, stderr })
        }
        _ = watchdog_timer => {
            debug!(program = %program, "watchdog expired, killing solver process");
            child.kill().await?;
            Ok(RunOutcome::TimedOut)
        }
        _ = cancel.cancelled() => {
            debug!(program = %program, "cancellation requested, killing solver process");
            child.kill().await?;
            Ok(RunOutcome::Cancelled)
        }
    }
}

async fn drain<R>(pipe: Option<R>) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return String::new();
    };
    let mut bytes = Vec::new();
    let _ = pipe.read_to_end(&mut bytes).await;
    String::from_utf8_lossy(&bytes).into_owned()
}
