//! One measurement cycle per scrape.
//!
//! The exporter owns the gauge set behind a single admission slot: one
//! cycle runs at a time, and a scrape arriving while a cycle is in flight is
//! refused instead of launching a second speedtest against the same link.

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::metrics::SpeedtestMetrics;
use crate::registry::RegistryError;
use crate::runner::{SpeedtestRunner, DEFAULT_TIMEOUT_SECS};

/// Why a scrape was not served.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("Speedtest measurement already in progress")]
    InProgress,
}

/// Per-cycle measurement parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementSettings {
    /// Server to test against; `None` lets the CLI pick the nearest one.
    pub server_id: Option<String>,
    pub timeout: Duration,
}

impl Default for MeasurementSettings {
    fn default() -> Self {
        Self {
            server_id: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Result of one served scrape.
#[derive(Debug, Clone)]
pub struct Scrape {
    pub up: bool,
    pub body: String,
    pub duration: Duration,
}

/// Runs measurement cycles and renders the gauges.
#[derive(Debug)]
pub struct Exporter {
    runner: SpeedtestRunner,
    settings: MeasurementSettings,
    metrics: Mutex<SpeedtestMetrics>,
}

impl Exporter {
    pub fn new(
        runner: SpeedtestRunner,
        settings: MeasurementSettings,
    ) -> Result<Self, RegistryError> {
        Ok(Self {
            runner,
            settings,
            metrics: Mutex::new(SpeedtestMetrics::new()?),
        })
    }

    pub fn settings(&self) -> &MeasurementSettings {
        &self.settings
    }

    pub fn runner(&self) -> &SpeedtestRunner {
        &self.runner
    }

    /// Runs one measurement cycle and renders the resulting exposition.
    ///
    /// Measurement failures never surface here; they are encoded as
    /// `speedtest_up 0` in the body.
    pub async fn scrape(&self) -> Result<Scrape, ScrapeError> {
        let mut metrics = self
            .metrics
            .try_lock()
            .map_err(|_| ScrapeError::InProgress)?;

        let start = Instant::now();
        let raw = self
            .runner
            .run(self.settings.server_id.as_deref(), self.settings.timeout)
            .await;

        match raw {
            Some(line) => match metrics.apply(&line) {
                Ok(labels) => info!(
                    "Speedtest {} against server {} ({}, {}) succeeded",
                    labels.test_uuid, labels.server_id, labels.server_name, labels.location
                ),
                Err(e) => {
                    warn!("Discarding speedtest result: {}", e);
                    metrics.mark_down();
                }
            },
            None => {
                debug!("No speedtest result this cycle");
                metrics.mark_down();
            }
        }

        Ok(Scrape {
            up: metrics.is_up(),
            body: metrics.render(),
            duration: start.elapsed(),
        })
    }
}
