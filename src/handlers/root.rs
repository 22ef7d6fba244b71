//! Root endpoint handler for the landing page.
//!
//! This module provides the `/` endpoint handler that links to the
//! metrics and health endpoints.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let version = env!("CARGO_PKG_VERSION");
    let built = env!("VERGEN_BUILD_TIMESTAMP");

    // Calculate actual uptime from service start time
    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    let uptime_str = format!("{}h {}m {}s", hours, minutes, seconds);

    let server = state
        .exporter
        .settings()
        .server_id
        .as_deref()
        .unwrap_or("nearest");

    let health_link = if state.config.enable_health.unwrap_or(true) {
        r#"<br/>
    Navigate to <a href="/health">/health</a> to check the exporter health."#
    } else {
        ""
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Speedtest Exporter</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 40px; line-height: 1.6; }}
        .info {{ color: #666; }}
        a {{ color: #007bff; font-weight: 600; }}
    </style>
</head>
<body>
    <h1>Welcome to Speedtest Exporter!</h1>
    <p class="info">Version {version} (built {built}) &middot; Uptime {uptime} &middot; Server {server}</p>
    Navigate to <a href="/metrics">/metrics</a> to perform speedtest and return the metrics.{health_link}
</body>
</html>"#,
        version = version,
        built = built,
        uptime = uptime_str,
        server = server,
        health_link = health_link,
    );

    Html(html)
}
