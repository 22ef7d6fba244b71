//! Speedtest Exporter Library
//!
//! This library implements the measurement-to-metrics pipeline of the
//! speedtest exporter. It is framework-agnostic: the binary wires it into an
//! HTTP server, but every piece can be driven directly.
//!
//! # Pipeline
//!
//! - **Registry** ([`registry`]): ordered, labeled gauges overwritten in place
//! - **Exposition** ([`exposition`]): Prometheus text rendering with stale-data suppression
//! - **Runner** ([`runner`]): `speedtest` subprocess under a hard deadline
//! - **Mapper** ([`metrics`]): result record to gauges, bandwidth in bits/s
//! - **Health** ([`health`]): binary presence and vendor check
//! - **Exporter** ([`exporter`]): one serialized measurement cycle per scrape
//!
//! # Usage
//!
//! ```rust
//! use speedtest_exporter::SpeedtestMetrics;
//!
//! let mut metrics = SpeedtestMetrics::new().unwrap();
//!
//! // A failed cycle publishes only the status gauge
//! metrics.mark_down();
//! assert!(metrics.render().ends_with("speedtest_up 0\n"));
//! ```

pub mod exporter;
pub mod exposition;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod result;
pub mod runner;

// Re-export main types for convenience
pub use exporter::{Exporter, MeasurementSettings, Scrape, ScrapeError};
pub use health::{HealthProber, HealthStatus, ProbeError};
pub use metrics::{MapError, ResultLabels, SpeedtestMetrics};
pub use registry::{Gauge, GaugeHandle, GaugeValue, Registry, RegistryError};
pub use result::SpeedtestResult;
pub use runner::{RunError, SpeedtestRunner};
