//! Speedtest gauge definitions and result mapping.
//!
//! `SpeedtestMetrics` owns the registry with the fixed gauge set and maps a
//! decoded result record onto it. Bandwidth is published in bits per second
//! (the CLI reports bytes per second); every other field passes through.

use thiserror::Error;

use crate::exposition;
use crate::registry::{GaugeHandle, GaugeValue, Registry, RegistryError};
use crate::result::{DecodeError, SpeedtestResult, Transfer};

/// Label keys shared by every per-measurement gauge, in rendering order.
pub const RESULT_LABEL_KEYS: [&str; 8] = [
    "test_uuid",
    "server_id",
    "isp",
    "server_name",
    "location",
    "country",
    "host",
    "ip",
];

/// Errors mapping a result line onto the gauges.
#[derive(Debug, Error)]
pub enum MapError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Label values of one measurement cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultLabels {
    pub test_uuid: String,
    pub server_id: String,
    pub isp: String,
    pub server_name: String,
    pub location: String,
    pub country: String,
    pub host: String,
    pub ip: String,
}

impl ResultLabels {
    pub fn from_result(result: &SpeedtestResult) -> Self {
        Self {
            test_uuid: result.result.id.clone(),
            server_id: result.server.id.to_string(),
            isp: result.isp.clone(),
            server_name: result.server.name.clone(),
            location: result.server.location.clone(),
            country: result.server.country.clone(),
            host: result.server.host.clone(),
            ip: result.server.ip.clone(),
        }
    }

    /// Key/value pairs in `RESULT_LABEL_KEYS` order.
    pub fn pairs(&self) -> [(&'static str, &str); 8] {
        [
            (RESULT_LABEL_KEYS[0], self.test_uuid.as_str()),
            (RESULT_LABEL_KEYS[1], self.server_id.as_str()),
            (RESULT_LABEL_KEYS[2], self.isp.as_str()),
            (RESULT_LABEL_KEYS[3], self.server_name.as_str()),
            (RESULT_LABEL_KEYS[4], self.location.as_str()),
            (RESULT_LABEL_KEYS[5], self.country.as_str()),
            (RESULT_LABEL_KEYS[6], self.host.as_str()),
            (RESULT_LABEL_KEYS[7], self.ip.as_str()),
        ]
    }
}

/// Gauges for one transfer direction.
#[derive(Debug, Clone, Copy)]
struct TransferGauges {
    bandwidth: GaugeHandle,
    duration: GaugeHandle,
    size: GaugeHandle,
    latency: GaugeHandle,
    jitter: GaugeHandle,
}

impl TransferGauges {
    fn declare(
        registry: &mut Registry,
        direction: &str,
        noun: &str,
    ) -> Result<Self, RegistryError> {
        let title = capitalize(direction);
        Ok(Self {
            bandwidth: registry.declare(
                &format!("speedtest_{direction}_bandwidth_bits_per_second"),
                &format!("{title} bandwidth in bits/s"),
                &RESULT_LABEL_KEYS,
            )?,
            duration: registry.declare(
                &format!("speedtest_{direction}_milliseconds"),
                &format!("{title} duration in milliseconds"),
                &RESULT_LABEL_KEYS,
            )?,
            size: registry.declare(
                &format!("speedtest_{direction}_size_bytes"),
                &format!("{noun} data size in bytes"),
                &RESULT_LABEL_KEYS,
            )?,
            latency: registry.declare(
                &format!("speedtest_{direction}_latency_milliseconds"),
                &format!("{title} latency in milliseconds"),
                &RESULT_LABEL_KEYS,
            )?,
            jitter: registry.declare(
                &format!("speedtest_{direction}_jitter_milliseconds"),
                &format!("{title} latency jitter in milliseconds"),
                &RESULT_LABEL_KEYS,
            )?,
        })
    }

    fn set(
        &self,
        registry: &mut Registry,
        transfer: &Transfer,
        labels: &[(&str, &str)],
    ) -> Result<(), RegistryError> {
        registry.set(self.bandwidth, bits_per_second(transfer.bandwidth), labels)?;
        registry.set(self.duration, transfer.elapsed, labels)?;
        registry.set(self.size, transfer.bytes, labels)?;
        registry.set(self.latency, transfer.latency.iqm, labels)?;
        registry.set(self.jitter, transfer.latency.jitter, labels)?;
        Ok(())
    }
}

/// The exporter's gauge set, declared once and mutated every cycle.
#[derive(Debug, Clone)]
pub struct SpeedtestMetrics {
    registry: Registry,
    up: GaugeHandle,
    packet_loss: GaugeHandle,
    ping_latency: GaugeHandle,
    ping_jitter: GaugeHandle,
    upload: TransferGauges,
    download: TransferGauges,
}

impl SpeedtestMetrics {
    /// Declares all speedtest gauges in exposition order.
    pub fn new() -> Result<Self, RegistryError> {
        let mut registry = Registry::new();

        let up = registry.declare_status(
            "speedtest_up",
            "Speedtest status whether the scrape worked",
        )?;
        let packet_loss = registry.declare(
            "speedtest_packet_loss",
            "Packet loss during Speedtest",
            &RESULT_LABEL_KEYS,
        )?;
        let ping_latency = registry.declare(
            "speedtest_ping_latency_milliseconds",
            "Ping in ms",
            &RESULT_LABEL_KEYS,
        )?;
        let ping_jitter = registry.declare(
            "speedtest_ping_jitter_milliseconds",
            "Jitter in ms",
            &RESULT_LABEL_KEYS,
        )?;
        let upload = TransferGauges::declare(&mut registry, "upload", "Uploaded")?;
        let download = TransferGauges::declare(&mut registry, "download", "Download")?;

        Ok(Self {
            registry,
            up,
            packet_loss,
            ping_latency,
            ping_jitter,
            upload,
            download,
        })
    }

    /// Decodes a raw result line and publishes it.
    ///
    /// On error the gauges are left untouched; callers mark the cycle down.
    pub fn apply(&mut self, raw_result_line: &str) -> Result<ResultLabels, MapError> {
        let result = SpeedtestResult::decode(raw_result_line)?;
        let labels = ResultLabels::from_result(&result);
        self.apply_result(&result, &labels)?;
        Ok(labels)
    }

    fn apply_result(
        &mut self,
        result: &SpeedtestResult,
        labels: &ResultLabels,
    ) -> Result<(), RegistryError> {
        // Label sets are validated against a scratch copy so a mismatch
        // cannot leave half of the gauges updated.
        let mut next = self.registry.clone();
        let pairs = labels.pairs();

        match result.packet_loss {
            Some(loss) => next.set(self.packet_loss, loss, &pairs)?,
            None => next.clear(self.packet_loss),
        }
        next.set(self.ping_latency, result.ping.latency, &pairs)?;
        next.set(self.ping_jitter, result.ping.jitter, &pairs)?;
        self.upload.set(&mut next, &result.upload, &pairs)?;
        self.download.set(&mut next, &result.download, &pairs)?;
        next.set(self.up, 1u64, &[])?;

        self.registry = next;
        Ok(())
    }

    /// Records a failed cycle; only `speedtest_up 0` is exposed afterwards.
    pub fn mark_down(&mut self) {
        // The status gauge is declared without labels, so this cannot fail.
        let _ = self.registry.set(self.up, 0u64, &[]);
    }

    pub fn is_up(&self) -> bool {
        matches!(self.registry.get_current(self.up).0, Some(v) if !v.is_zero())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Current value of a gauge by name.
    pub fn value(&self, name: &str) -> Option<GaugeValue> {
        self.registry
            .find(name)
            .and_then(|h| self.registry.get_current(h).0)
    }

    pub fn render(&self) -> String {
        exposition::render(&self.registry)
    }
}

fn bits_per_second(bytes_per_second: u64) -> u64 {
    bytes_per_second.saturating_mul(8)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::fixtures::RESULT_LINE;

    #[test]
    fn test_declares_fixed_gauge_set_in_order() {
        let metrics = SpeedtestMetrics::new().unwrap();
        let names: Vec<&str> = metrics.registry().gauges().map(|g| g.name()).collect();
        assert_eq!(
            names,
            vec![
                "speedtest_up",
                "speedtest_packet_loss",
                "speedtest_ping_latency_milliseconds",
                "speedtest_ping_jitter_milliseconds",
                "speedtest_upload_bandwidth_bits_per_second",
                "speedtest_upload_milliseconds",
                "speedtest_upload_size_bytes",
                "speedtest_upload_latency_milliseconds",
                "speedtest_upload_jitter_milliseconds",
                "speedtest_download_bandwidth_bits_per_second",
                "speedtest_download_milliseconds",
                "speedtest_download_size_bytes",
                "speedtest_download_latency_milliseconds",
                "speedtest_download_jitter_milliseconds",
            ]
        );
        let upload_size = metrics
            .registry()
            .find("speedtest_upload_size_bytes")
            .unwrap();
        assert_eq!(
            metrics.registry().gauge(upload_size).description(),
            "Uploaded data size in bytes"
        );
    }

    #[test]
    fn test_apply_converts_bandwidth_to_bits() {
        let mut metrics = SpeedtestMetrics::new().unwrap();
        metrics.apply(RESULT_LINE).unwrap();

        assert_eq!(
            metrics.value("speedtest_upload_bandwidth_bits_per_second"),
            Some(GaugeValue::Integer(1_000_000))
        );
        assert_eq!(
            metrics.value("speedtest_download_bandwidth_bits_per_second"),
            Some(GaugeValue::Integer(2_000_000))
        );
        let text = metrics.render();
        assert!(text.contains("} 1000000\n"));
        assert!(text.contains("} 2000000\n"));
    }

    #[test]
    fn test_apply_passes_other_fields_through() {
        let mut metrics = SpeedtestMetrics::new().unwrap();
        metrics.apply(RESULT_LINE).unwrap();

        assert!(metrics.is_up());
        assert_eq!(
            metrics.value("speedtest_ping_latency_milliseconds"),
            Some(GaugeValue::Float(8.27))
        );
        assert_eq!(
            metrics.value("speedtest_upload_milliseconds"),
            Some(GaugeValue::Integer(10_000))
        );
        assert_eq!(
            metrics.value("speedtest_download_size_bytes"),
            Some(GaugeValue::Integer(3_000_000))
        );
        assert_eq!(
            metrics.value("speedtest_upload_latency_milliseconds"),
            Some(GaugeValue::Float(30.75))
        );
        assert_eq!(
            metrics.value("speedtest_download_jitter_milliseconds"),
            Some(GaugeValue::Float(2.25))
        );
        assert_eq!(
            metrics.value("speedtest_packet_loss"),
            Some(GaugeValue::Float(0.5))
        );
    }

    #[test]
    fn test_apply_attaches_shared_label_set() {
        let mut metrics = SpeedtestMetrics::new().unwrap();
        let labels = metrics.apply(RESULT_LINE).unwrap();
        assert_eq!(labels.server_id, "12345");
        assert_eq!(labels.isp, "Example ISP");
        assert_eq!(labels.server_name, "Example Net");

        let expected = "{test_uuid=\"d6b1c6a0-0000-4000-8000-000000000001\",server_id=\"12345\",\
                        isp=\"Example ISP\",server_name=\"Example Net\",location=\"Berlin\",\
                        country=\"Germany\",host=\"speedtest.example.net\",ip=\"203.0.113.10\"}";
        let text = metrics.render();
        for gauge in metrics.registry().gauges().skip(1) {
            let line = format!("{}{} ", gauge.name(), expected);
            assert!(text.contains(&line), "missing labeled sample for {}", gauge.name());
        }
        assert!(text.contains("speedtest_up 1\n"));
    }

    #[test]
    fn test_missing_packet_loss_clears_gauge() {
        let mut metrics = SpeedtestMetrics::new().unwrap();
        metrics.apply(RESULT_LINE).unwrap();

        let without_loss = RESULT_LINE.replacen("\"packetLoss\":0.5,", "", 1);
        metrics.apply(&without_loss).unwrap();

        assert_eq!(metrics.value("speedtest_packet_loss"), None);
        let text = metrics.render();
        assert!(text.contains("# TYPE speedtest_packet_loss gauge\n"));
        assert!(!text.contains("speedtest_packet_loss{"));
    }

    #[test]
    fn test_apply_decode_failure_leaves_state_untouched() {
        let mut metrics = SpeedtestMetrics::new().unwrap();
        metrics.apply(RESULT_LINE).unwrap();
        let before = metrics.render();

        assert!(matches!(
            metrics.apply(r#"{"type":"result"}"#),
            Err(MapError::Decode(_))
        ));
        assert_eq!(metrics.render(), before);
    }

    #[test]
    fn test_mark_down_suppresses_previous_cycle() {
        let mut metrics = SpeedtestMetrics::new().unwrap();
        metrics.apply(RESULT_LINE).unwrap();
        metrics.mark_down();

        assert!(!metrics.is_up());
        assert_eq!(
            metrics.render(),
            "# HELP speedtest_up Speedtest status whether the scrape worked\n\
             # TYPE speedtest_up gauge\n\
             speedtest_up 0\n"
        );

        metrics.apply(RESULT_LINE).unwrap();
        assert!(metrics.render().contains("speedtest_ping_jitter_milliseconds{"));
    }

    #[test]
    fn test_bits_per_second_saturates() {
        assert_eq!(bits_per_second(125_000), 1_000_000);
        assert_eq!(bits_per_second(u64::MAX), u64::MAX);
    }
}
