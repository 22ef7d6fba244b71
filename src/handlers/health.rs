//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler. It verifies that the
//! official speedtest CLI is installed without running a measurement.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let health = state.prober.check().await;
    let status = if health.ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    debug!("Health check: {} - {}", status, health.message);
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        health.message,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::AppState;
    use std::sync::Arc;

    async fn health_for(binary: &str) -> (StatusCode, String) {
        let config = Config {
            speedtest_binary: Some(binary.to_string()),
            ..Config::default()
        };
        let state = Arc::new(AppState::from_config(config).unwrap());

        let response = health_handler(State(state)).await.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    /// Writes an executable script answering `--version` with `banner`.
    #[cfg(unix)]
    fn version_script(dir: &std::path::Path, banner: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("speedtest");
        std::fs::write(&path, format!("#!/bin/sh\necho '{banner}'\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_missing_binary_reports_500() {
        let (status, body) = health_for("speedtest-binary-that-does-not-exist").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Speedtest CLI binary not found in PATH");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_official_cli_reports_ok() {
        let dir = tempfile::TempDir::new().unwrap();
        let binary = version_script(
            dir.path(),
            "Speedtest by Ookla 1.2.0.84 (ea6b6773cf) Linux/x86_64-linux-musl",
        );

        let (status, body) = health_for(&binary).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_community_cli_reports_500() {
        let dir = tempfile::TempDir::new().unwrap();
        let binary = version_script(dir.path(), "speedtest-cli 2.1.3");

        let (status, body) = health_for(&binary).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            "Speedtest CLI that is installed is not the official version."
        );
    }
}
