//! Metrics endpoint handler for Prometheus scraping.
//!
//! Every request runs one speedtest and returns the rendered gauges. A failed
//! measurement still answers 200 with `speedtest_up 0`; only a scrape that
//! overlaps a running measurement is refused.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use speedtest_exporter::{exposition::CONTENT_TYPE, ScrapeError};
use tracing::{debug, info, instrument, warn};

use crate::state::SharedState;

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Response {
    debug!("Processing /metrics request");

    match state.exporter.scrape().await {
        Ok(scrape) => {
            info!(
                "Served /metrics (up={}) in {:.2}s",
                u8::from(scrape.up),
                scrape.duration.as_secs_f64()
            );
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, CONTENT_TYPE)],
                scrape.body,
            )
                .into_response()
        }
        Err(e @ ScrapeError::InProgress) => {
            warn!("Rejected /metrics request: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::CONTENT_TYPE, CONTENT_TYPE)],
                e.to_string(),
            )
                .into_response()
        }
    }
}
