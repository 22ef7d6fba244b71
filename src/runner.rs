//! Speedtest CLI invocation.
//!
//! Runs the external `speedtest` binary with JSON output under a hard
//! wall-clock deadline and picks the terminal result event out of its
//! line-delimited output. Every failure is logged and collapses into "no
//! result"; nothing here faults the request path.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use crate::result::{EventHeader, LOG_EVENT_TYPE};

/// Binary name looked up on PATH when none is configured.
pub const DEFAULT_BINARY: &str = "speedtest";

/// Default measurement deadline in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Arguments passed on every run, before the optional server selection.
pub const BASE_ARGS: [&str; 4] = [
    "--format=json",
    "--progress=no",
    "--accept-license",
    "--accept-gdpr",
];

/// Reasons a measurement run produced no result.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to start '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read speedtest output: {0}")]
    Io(#[from] std::io::Error),

    #[error("speedtest did not finish within {0:?} and was killed")]
    Timeout(Duration),

    #[error("speedtest exited with {0}")]
    Exit(ExitStatus),

    #[error("speedtest output contained no result event")]
    NoResult,
}

/// Invokes the speedtest binary.
#[derive(Debug, Clone)]
pub struct SpeedtestRunner {
    binary: PathBuf,
}

impl Default for SpeedtestRunner {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

impl SpeedtestRunner {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Command line arguments for one run.
    pub fn args(server_id: Option<&str>) -> Vec<OsString> {
        let mut args: Vec<OsString> = BASE_ARGS.iter().map(OsString::from).collect();
        if let Some(id) = server_id {
            args.push(format!("--server-id={id}").into());
        }
        args
    }

    /// Runs one measurement and returns the raw result line, or `None` on
    /// any failure (already logged).
    pub async fn run(&self, server_id: Option<&str>, timeout: Duration) -> Option<String> {
        match self.try_run(server_id, timeout).await {
            Ok(line) => Some(line),
            Err(RunError::Timeout(limit)) => {
                error!(
                    "Speedtest CLI process took longer than {}s to complete and was killed",
                    limit.as_secs_f64()
                );
                None
            }
            Err(e) => {
                error!("Speedtest run failed: {}", e);
                None
            }
        }
    }

    /// Runs one measurement, reporting why it failed.
    pub async fn try_run(
        &self,
        server_id: Option<&str>,
        timeout: Duration,
    ) -> Result<String, RunError> {
        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + timeout;
        let mut cmd = Command::new(&self.binary);
        cmd.args(Self::args(server_id))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so helpers the CLI forks die with it
        #[cfg(unix)]
        cmd.process_group(0);

        debug!(
            "Spawning {} with server_id={:?}, timeout={:?}",
            self.binary.display(),
            server_id,
            timeout
        );

        let mut child = cmd.spawn().map_err(|source| RunError::Spawn {
            binary: self.binary.display().to_string(),
            source,
        })?;
        let pid = child.id();

        let stdout = child.stdout.take().ok_or_else(|| {
            RunError::Io(std::io::Error::other("speedtest stdout was not captured"))
        })?;

        let mut stderr_handle = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr);
                let mut buf = Vec::new();
                loop {
                    match read_line_lossy(&mut reader, &mut buf).await {
                        Ok(Some(line)) => warn!("speedtest stderr: {}", line),
                        Ok(None) => break,
                        Err(e) => {
                            debug!("Stopped reading speedtest stderr: {}", e);
                            break;
                        }
                    }
                }
            })
        });

        let collect = async {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            let mut result = None;
            while let Some(line) = read_line_lossy(&mut reader, &mut buf).await? {
                if let Some(found) = inspect_line(line) {
                    result = Some(found);
                }
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, result))
        };

        let outcome = tokio::time::timeout_at(deadline, collect).await;

        let (status, result) = match outcome {
            Ok(Ok(done)) => done,
            Ok(Err(e)) => {
                terminate(&mut child, pid).await;
                if let Some(handle) = stderr_handle {
                    handle.abort();
                }
                return Err(RunError::Io(e));
            }
            Err(_) => {
                terminate(&mut child, pid).await;
                if let Some(handle) = stderr_handle {
                    handle.abort();
                }
                return Err(RunError::Timeout(timeout));
            }
        };

        // A leftover helper may still hold stderr open; the drain shares the deadline
        if let Some(handle) = stderr_handle.as_mut() {
            if tokio::time::timeout_at(deadline, &mut *handle).await.is_err() {
                warn!("speedtest stderr still open at the deadline, killing leftovers");
                handle.abort();
                kill_group(pid);
            }
        }

        if !status.success() {
            return Err(RunError::Exit(status));
        }

        let line = result.ok_or(RunError::NoResult)?;
        info!(
            "Speedtest completed in {:.2}s",
            start.elapsed().as_secs_f64()
        );
        Ok(line)
    }
}

/// Reads one line, replacing invalid UTF-8. Returns `None` at end of stream.
async fn read_line_lossy<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

/// Kills the child and everything left in its process group.
async fn terminate(child: &mut Child, pid: Option<u32>) {
    kill_group(pid);
    if let Err(e) = child.kill().await {
        warn!("Failed to kill speedtest process: {}", e);
    }
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        // ESRCH: the group is already gone
        debug!("killpg({}) failed: {}", pgid, e);
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

/// Logs one stdout line and returns it if it is a result event.
fn inspect_line(line: String) -> Option<String> {
    match EventHeader::parse(&line) {
        Some(header) if header.is_result() => {
            debug!("speedtest result: {}", line);
            Some(line)
        }
        Some(header) if header.kind == LOG_EVENT_TYPE => {
            let message = header.message.as_deref().unwrap_or_default();
            match header.level.as_deref() {
                Some("error") | Some("warning") => warn!("speedtest: {}", message),
                _ => debug!("speedtest: {}", message),
            }
            None
        }
        Some(header) => {
            debug!("speedtest event: {}", header.kind);
            None
        }
        None => {
            if !line.trim().is_empty() {
                debug!("speedtest stdout: {}", line);
            }
            None
        }
    }
}
