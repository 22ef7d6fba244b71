//! Speedtest CLI installation probe.
//!
//! `/health` does not run a measurement. It only verifies that the
//! configured binary can be found on PATH and that `--version` identifies it
//! as the official Ookla client; community reimplementations ship under the
//! same binary name but do not speak the same JSON format.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error};

use crate::runner::DEFAULT_BINARY;

/// Substring expected in the `--version` output of the official CLI.
pub const OFFICIAL_VENDOR_SIGNATURE: &str = "Speedtest by Ookla";

/// Deadline for the version query.
pub const VERSION_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Reasons the installed CLI is unusable.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Speedtest CLI binary not found in PATH")]
    NotFound(#[source] which::Error),

    #[error("Speedtest CLI that is installed is not the official version.")]
    NotOfficial,

    #[error("Speedtest CLI version query failed: {0}")]
    VersionQuery(#[source] std::io::Error),

    #[error("Speedtest CLI version query did not finish within {0:?}")]
    VersionTimeout(Duration),
}

/// Outcome of a health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub ok: bool,
    pub message: String,
}

impl HealthStatus {
    pub const OK_MESSAGE: &'static str = "OK";
}

/// Probes the speedtest installation.
#[derive(Debug, Clone)]
pub struct HealthProber {
    binary: PathBuf,
    version_timeout: Duration,
}

impl Default for HealthProber {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

impl HealthProber {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            version_timeout: VERSION_QUERY_TIMEOUT,
        }
    }

    pub fn with_version_timeout(mut self, timeout: Duration) -> Self {
        self.version_timeout = timeout;
        self
    }

    /// Runs both checks, short-circuiting on the first failure.
    pub async fn check(&self) -> HealthStatus {
        match self.probe().await {
            Ok(path) => {
                debug!("Speedtest CLI found at {}", path.display());
                HealthStatus {
                    ok: true,
                    message: HealthStatus::OK_MESSAGE.to_string(),
                }
            }
            Err(e) => {
                error!("{}", e);
                HealthStatus {
                    ok: false,
                    message: e.to_string(),
                }
            }
        }
    }

    /// Resolves the binary and verifies its vendor signature.
    pub async fn probe(&self) -> Result<PathBuf, ProbeError> {
        let path = which::which(&self.binary).map_err(ProbeError::NotFound)?;

        let mut cmd = Command::new(&path);
        cmd.arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.version_timeout, cmd.output())
            .await
            .map_err(|_| ProbeError::VersionTimeout(self.version_timeout))?
            .map_err(ProbeError::VersionQuery)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!("speedtest --version: {}", stdout.lines().next().unwrap_or(""));
        if !stdout.contains(OFFICIAL_VENDOR_SIGNATURE) {
            return Err(ProbeError::NotOfficial);
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_not_found() {
        let prober = HealthProber::new("speedtest-binary-that-does-not-exist");
        let status = prober.check().await;
        assert!(!status.ok);
        assert_eq!(status.message, "Speedtest CLI binary not found in PATH");
    }

    #[test]
    fn test_not_official_message() {
        assert_eq!(
            ProbeError::NotOfficial.to_string(),
            "Speedtest CLI that is installed is not the official version."
        );
    }
}
