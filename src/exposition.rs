//! Prometheus text exposition of the gauge registry.
//!
//! Every gauge renders a `# HELP` and `# TYPE` header followed by one sample
//! line once a value has been set. If the registry's status gauge reads 0,
//! only the status gauge is rendered so stale measurements are never
//! published as current.

use std::fmt::Write as FmtWrite;

use crate::registry::{Gauge, Registry};

/// Content type of the `/metrics` response body.
pub const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Renders the registry's current state. Total over every registry state.
pub fn render(registry: &Registry) -> String {
    let mut out = String::with_capacity(4096);

    let status_down = registry
        .status()
        .map(|h| (h, registry.get_current(h).0))
        .filter(|(_, value)| value.is_some_and(|v| v.is_zero()));

    if let Some((handle, _)) = status_down {
        write_gauge(&mut out, registry.gauge(handle));
        return out;
    }

    for gauge in registry.gauges() {
        write_gauge(&mut out, gauge);
    }
    out
}

fn write_gauge(out: &mut String, gauge: &Gauge) {
    let _ = writeln!(
        out,
        "# HELP {} {}",
        gauge.name(),
        escape_help(gauge.description())
    );
    let _ = writeln!(out, "# TYPE {} {}", gauge.name(), gauge.metric_type());

    if let Some(value) = gauge.value() {
        let _ = writeln!(
            out,
            "{}{} {}",
            gauge.name(),
            format_labels(gauge.labels()),
            value
        );
    }
}

fn format_labels(labels: &[(String, String)]) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let mut buf = String::from("{");
    for (i, (name, value)) in labels.iter().enumerate() {
        if i > 0 {
            buf.push(',');
        }
        let _ = write!(buf, "{}=\"{}\"", name, escape_label_value(value));
    }
    buf.push('}');
    buf
}

fn escape_help(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::GaugeValue;

    fn sample_registry() -> Registry {
        let mut registry = Registry::new();
        registry.declare_status("speedtest_up", "Up").unwrap();
        registry
            .declare("speedtest_size_bytes", "Size", &["isp", "host"])
            .unwrap();
        registry
    }

    #[test]
    fn test_render_unset_registry_emits_headers_only() {
        let registry = sample_registry();
        let text = render(&registry);
        assert_eq!(
            text,
            "# HELP speedtest_up Up\n\
             # TYPE speedtest_up gauge\n\
             # HELP speedtest_size_bytes Size\n\
             # TYPE speedtest_size_bytes gauge\n"
        );
    }

    #[test]
    fn test_render_empty_registry() {
        assert_eq!(render(&Registry::new()), "");
    }

    #[test]
    fn test_render_values_and_labels_in_supplied_order() {
        let mut registry = sample_registry();
        let up = registry.find("speedtest_up").unwrap();
        let size = registry.find("speedtest_size_bytes").unwrap();
        registry.set(up, 1u64, &[]).unwrap();
        registry
            .set(size, 1024u64, &[("host", "h1"), ("isp", "ACME")])
            .unwrap();

        let text = render(&registry);
        assert!(text.contains("speedtest_up 1\n"));
        assert!(text.contains("speedtest_size_bytes{host=\"h1\",isp=\"ACME\"} 1024\n"));
    }

    #[test]
    fn test_render_status_down_suppresses_other_gauges() {
        let mut registry = sample_registry();
        let up = registry.find("speedtest_up").unwrap();
        let size = registry.find("speedtest_size_bytes").unwrap();
        registry
            .set(size, 1024u64, &[("isp", "ACME"), ("host", "h1")])
            .unwrap();
        registry.set(up, 0u64, &[]).unwrap();

        assert_eq!(
            render(&registry),
            "# HELP speedtest_up Up\n# TYPE speedtest_up gauge\nspeedtest_up 0\n"
        );
    }

    #[test]
    fn test_render_is_idempotent() {
        let mut registry = sample_registry();
        let size = registry.find("speedtest_size_bytes").unwrap();
        registry
            .set(size, GaugeValue::Float(0.25), &[("isp", "a"), ("host", "b")])
            .unwrap();
        assert_eq!(render(&registry), render(&registry));
    }

    #[test]
    fn test_render_escapes_label_values_and_help() {
        let mut registry = Registry::new();
        let g = registry
            .declare("speedtest_x", "line one\nback\\slash", &["isp"])
            .unwrap();
        registry
            .set(g, 1u64, &[("isp", "Say \"hi\"\\\nbye")])
            .unwrap();

        let text = render(&registry);
        assert!(text.contains("# HELP speedtest_x line one\\nback\\\\slash\n"));
        assert!(text.contains("speedtest_x{isp=\"Say \\\"hi\\\"\\\\\\nbye\"} 1\n"));
    }
}
