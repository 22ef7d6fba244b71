//! Shared helpers for integration tests: fake speedtest binaries.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Result line with upload 125000 B/s and download 250000 B/s.
pub const RESULT_LINE: &str = r#"{"type":"result","timestamp":"2024-05-01T10:00:00Z","ping":{"jitter":0.512,"latency":8.27,"low":7.9,"high":9.1},"download":{"bandwidth":250000,"bytes":3000000,"elapsed":12000,"latency":{"iqm":15.5,"low":8.1,"high":40.2,"jitter":2.25}},"upload":{"bandwidth":125000,"bytes":1500000,"elapsed":10000,"latency":{"iqm":30.75,"low":9.0,"high":80.0,"jitter":4.5}},"packetLoss":0,"isp":"Example ISP","interface":{"internalIp":"10.0.0.2","name":"eth0","macAddr":"00:11:22:33:44:55","isVpn":false,"externalIp":"198.51.100.7"},"server":{"id":12345,"host":"speedtest.example.net","port":8080,"name":"Example Net","location":"Berlin","country":"Germany","ip":"203.0.113.10"},"result":{"id":"d6b1c6a0-0000-4000-8000-000000000001","url":"https://www.speedtest.net/result/c/d6b1c6a0-0000-4000-8000-000000000001","persisted":true}}"#;

/// Writes an executable `/bin/sh` script and returns its path.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("stat script").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod script");
    path
}

/// Script body printing the event stream of a successful run.
pub fn successful_run() -> String {
    format!(
        "echo '{{\"type\":\"testStart\",\"isp\":\"Example ISP\"}}'\n\
         echo '{{\"type\":\"ping\",\"ping\":{{\"jitter\":0.5,\"latency\":8.2,\"progress\":1.0}}}}'\n\
         cat <<'JSON'\n{RESULT_LINE}\nJSON"
    )
}
