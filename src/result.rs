//! Speedtest CLI JSON result record.
//!
//! With `--format=json` the CLI writes one JSON event per line. Only the
//! terminal `"type":"result"` event carries the aggregated figures decoded
//! here; everything else is progress or log chatter.

use serde::Deserialize;
use thiserror::Error;

/// `type` value of the terminal result event.
pub const RESULT_EVENT_TYPE: &str = "result";

/// `type` value of CLI log events.
pub const LOG_EVENT_TYPE: &str = "log";

/// Errors decoding a result line.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("result line is not a valid speedtest result record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a 'result' event, got '{0}'")]
    UnexpectedType(String),
}

/// Envelope shared by every event line the CLI emits.
#[derive(Debug, Deserialize)]
pub struct EventHeader {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl EventHeader {
    /// Parses the envelope of a line; `None` if the line is not a JSON event.
    pub fn parse(line: &str) -> Option<Self> {
        serde_json::from_str(line).ok()
    }

    pub fn is_result(&self) -> bool {
        self.kind == RESULT_EVENT_TYPE
    }
}

/// Decoded terminal result of one measurement run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedtestResult {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub ping: Ping,
    pub download: Transfer,
    pub upload: Transfer,
    /// Omitted by the CLI when loss could not be measured.
    #[serde(default)]
    pub packet_loss: Option<f64>,
    pub isp: String,
    pub server: Server,
    pub result: ResultInfo,
}

impl SpeedtestResult {
    pub fn decode(line: &str) -> Result<Self, DecodeError> {
        let record: SpeedtestResult = serde_json::from_str(line)?;
        if record.kind != RESULT_EVENT_TYPE {
            return Err(DecodeError::UnexpectedType(record.kind));
        }
        Ok(record)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ping {
    pub jitter: f64,
    pub latency: f64,
}

/// Upload or download figures.
#[derive(Debug, Clone, Deserialize)]
pub struct Transfer {
    /// Bytes per second.
    pub bandwidth: u64,
    pub bytes: u64,
    /// Milliseconds.
    pub elapsed: u64,
    pub latency: TransferLatency,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferLatency {
    /// Interquartile mean in milliseconds.
    pub iqm: f64,
    pub jitter: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub id: u64,
    pub host: String,
    pub name: String,
    pub location: String,
    pub country: String,
    pub ip: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultInfo {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// A result line as printed by Speedtest CLI 1.2.
    pub const RESULT_LINE: &str = r#"{"type":"result","timestamp":"2024-05-01T10:00:00Z","ping":{"jitter":0.512,"latency":8.27,"low":7.9,"high":9.1},"download":{"bandwidth":250000,"bytes":3000000,"elapsed":12000,"latency":{"iqm":15.5,"low":8.1,"high":40.2,"jitter":2.25}},"upload":{"bandwidth":125000,"bytes":1500000,"elapsed":10000,"latency":{"iqm":30.75,"low":9.0,"high":80.0,"jitter":4.5}},"packetLoss":0.5,"isp":"Example ISP","interface":{"internalIp":"10.0.0.2","name":"eth0","macAddr":"00:11:22:33:44:55","isVpn":false,"externalIp":"198.51.100.7"},"server":{"id":12345,"host":"speedtest.example.net","port":8080,"name":"Example Net","location":"Berlin","country":"Germany","ip":"203.0.113.10"},"result":{"id":"d6b1c6a0-0000-4000-8000-000000000001","url":"https://www.speedtest.net/result/c/d6b1c6a0-0000-4000-8000-000000000001","persisted":true}}"#;
}

#[cfg(test)]
mod tests {
    use super::fixtures::RESULT_LINE;
    use super::*;

    #[test]
    fn test_decode_result_line() {
        let record = SpeedtestResult::decode(RESULT_LINE).unwrap();
        assert_eq!(record.upload.bandwidth, 125_000);
        assert_eq!(record.download.bandwidth, 250_000);
        assert_eq!(record.download.latency.iqm, 15.5);
        assert_eq!(record.server.id, 12345);
        assert_eq!(record.isp, "Example ISP");
        assert_eq!(record.packet_loss, Some(0.5));
    }

    #[test]
    fn test_decode_rejects_other_event_types() {
        let line = RESULT_LINE.replacen(r#""type":"result""#, r#""type":"testStart""#, 1);
        assert!(matches!(
            SpeedtestResult::decode(&line),
            Err(DecodeError::UnexpectedType(kind)) if kind == "testStart"
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_line() {
        assert!(matches!(
            SpeedtestResult::decode(r#"{"type":"result","ping":{"#),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn test_event_header() {
        let header = EventHeader::parse(
            r#"{"type":"log","timestamp":"x","message":"No servers","level":"error"}"#,
        )
        .unwrap();
        assert_eq!(header.kind, LOG_EVENT_TYPE);
        assert_eq!(header.level.as_deref(), Some("error"));
        assert!(!header.is_result());
        assert!(EventHeader::parse("Speedtest by Ookla").is_none());
    }
}
