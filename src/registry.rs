//! Minimal gauge registry for the speedtest exporter.
//!
//! The exporter publishes a fixed, known set of gauges. Each gauge is declared
//! once at startup with its name, description and label keys, then overwritten
//! in place on every measurement cycle. Only the latest observation is kept.

use std::fmt;

use thiserror::Error;

/// Metric type tag written on the `# TYPE` line of every gauge.
pub const GAUGE_TYPE: &str = "gauge";

/// Current value of a gauge, keeping the numeric domain of the source field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GaugeValue {
    Integer(u64),
    Float(f64),
}

impl GaugeValue {
    /// Returns true if the value is numerically zero.
    pub fn is_zero(&self) -> bool {
        match *self {
            GaugeValue::Integer(v) => v == 0,
            GaugeValue::Float(v) => v == 0.0,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            GaugeValue::Integer(v) => v as f64,
            GaugeValue::Float(v) => v,
        }
    }
}

impl From<u64> for GaugeValue {
    fn from(v: u64) -> Self {
        GaugeValue::Integer(v)
    }
}

impl From<f64> for GaugeValue {
    fn from(v: f64) -> Self {
        GaugeValue::Float(v)
    }
}

impl fmt::Display for GaugeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            GaugeValue::Integer(v) => write!(f, "{v}"),
            GaugeValue::Float(v) if v.is_nan() => f.write_str("NaN"),
            GaugeValue::Float(v) if v.is_infinite() => {
                f.write_str(if v > 0.0 { "+Inf" } else { "-Inf" })
            }
            GaugeValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Opaque reference to a declared gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GaugeHandle(usize);

/// Errors raised while declaring or updating gauges.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("invalid metric name '{0}'")]
    InvalidName(String),

    #[error("invalid label name '{label}' on metric '{metric}'")]
    InvalidLabelName { metric: String, label: String },

    #[error("metric '{0}' is already declared")]
    Duplicate(String),

    #[error("labels {supplied:?} do not match the declared label set {declared:?} of '{metric}'")]
    LabelMismatch {
        metric: String,
        declared: Vec<String>,
        supplied: Vec<String>,
    },

    #[error("a status gauge is already declared ('{0}')")]
    StatusAlreadyDeclared(String),
}

/// A named, described gauge with an optional current value and label set.
#[derive(Debug, Clone)]
pub struct Gauge {
    name: String,
    description: String,
    label_keys: Vec<String>,
    value: Option<GaugeValue>,
    labels: Vec<(String, String)>,
}

impl Gauge {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn metric_type(&self) -> &'static str {
        GAUGE_TYPE
    }

    pub fn label_keys(&self) -> &[String] {
        &self.label_keys
    }

    /// Current value, absent until the first `set`.
    pub fn value(&self) -> Option<GaugeValue> {
        self.value
    }

    /// Labels attached by the last `set`, in the order they were supplied.
    pub fn labels(&self) -> &[(String, String)] {
        &self.labels
    }
}

/// Ordered collection of gauges.
///
/// Declaration order is rendering order. One gauge may be marked as the
/// status gauge; the renderer uses it to suppress stale measurements.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    gauges: Vec<Gauge>,
    status: Option<GaugeHandle>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a gauge with a fixed label key set.
    pub fn declare(
        &mut self,
        name: &str,
        description: &str,
        label_keys: &[&str],
    ) -> Result<GaugeHandle, RegistryError> {
        if !is_valid_metric_name(name) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        if self.gauges.iter().any(|g| g.name == name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        for (i, key) in label_keys.iter().enumerate() {
            if !is_valid_label_name(key) || label_keys[..i].contains(key) {
                return Err(RegistryError::InvalidLabelName {
                    metric: name.to_string(),
                    label: key.to_string(),
                });
            }
        }

        self.gauges.push(Gauge {
            name: name.to_string(),
            description: description.to_string(),
            label_keys: label_keys.iter().map(|k| k.to_string()).collect(),
            value: None,
            labels: Vec::new(),
        });
        Ok(GaugeHandle(self.gauges.len() - 1))
    }

    /// Declares the unlabeled gauge that reports whether the last cycle worked.
    pub fn declare_status(
        &mut self,
        name: &str,
        description: &str,
    ) -> Result<GaugeHandle, RegistryError> {
        if let Some(existing) = self.status {
            return Err(RegistryError::StatusAlreadyDeclared(
                self.gauges[existing.0].name.clone(),
            ));
        }
        let handle = self.declare(name, description, &[])?;
        self.status = Some(handle);
        Ok(handle)
    }

    /// Overwrites value and labels of a gauge.
    ///
    /// The supplied label keys must be exactly the declared key set; the
    /// supplied order is kept for rendering.
    pub fn set(
        &mut self,
        handle: GaugeHandle,
        value: impl Into<GaugeValue>,
        labels: &[(&str, &str)],
    ) -> Result<(), RegistryError> {
        let gauge = &mut self.gauges[handle.0];
        check_labels(gauge, labels)?;

        gauge.value = Some(value.into());
        gauge.labels = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Ok(())
    }

    /// Drops the current value and labels; the gauge renders header-only.
    pub fn clear(&mut self, handle: GaugeHandle) {
        let gauge = &mut self.gauges[handle.0];
        gauge.value = None;
        gauge.labels.clear();
    }

    pub fn get_current(&self, handle: GaugeHandle) -> (Option<GaugeValue>, &[(String, String)]) {
        let gauge = &self.gauges[handle.0];
        (gauge.value, &gauge.labels)
    }

    pub fn gauge(&self, handle: GaugeHandle) -> &Gauge {
        &self.gauges[handle.0]
    }

    pub fn find(&self, name: &str) -> Option<GaugeHandle> {
        self.gauges
            .iter()
            .position(|g| g.name == name)
            .map(GaugeHandle)
    }

    pub fn status(&self) -> Option<GaugeHandle> {
        self.status
    }

    /// Gauges in declaration order.
    pub fn gauges(&self) -> impl Iterator<Item = &Gauge> {
        self.gauges.iter()
    }

    pub fn len(&self) -> usize {
        self.gauges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty()
    }
}

fn check_labels(gauge: &Gauge, labels: &[(&str, &str)]) -> Result<(), RegistryError> {
    let consistent = labels.len() == gauge.label_keys.len()
        && labels.iter().enumerate().all(|(i, (key, _))| {
            gauge.label_keys.iter().any(|k| k == key)
                && !labels[..i].iter().any(|(seen, _)| seen == key)
        });

    if consistent {
        Ok(())
    } else {
        Err(RegistryError::LabelMismatch {
            metric: gauge.name.clone(),
            declared: gauge.label_keys.clone(),
            supplied: labels.iter().map(|(k, _)| k.to_string()).collect(),
        })
    }
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, names starting with `__` are reserved.
fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
