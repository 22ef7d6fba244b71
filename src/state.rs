//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers.

use speedtest_exporter::{Exporter, HealthProber};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    /// Measurement pipeline; owns the gauge set behind its admission slot.
    pub exporter: Exporter,
    pub prober: HealthProber,
    pub config: Arc<Config>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Builds the exporter and prober for the effective configuration.
    pub fn from_config(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let binary = config.speedtest_binary().to_string();
        let exporter = Exporter::new(
            speedtest_exporter::SpeedtestRunner::new(&binary),
            config.measurement_settings(),
        )?;

        Ok(Self {
            exporter,
            prober: HealthProber::new(binary),
            config: Arc::new(config),
            start_time: Instant::now(),
        })
    }
}
