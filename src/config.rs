//! Configuration management for speedtest-exporter.
//!
//! This module handles loading, merging, and validating configuration from files,
//! environment variables and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use speedtest_exporter::runner::{DEFAULT_BINARY, DEFAULT_TIMEOUT_SECS};
use speedtest_exporter::MeasurementSettings;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9798;

/// Exporter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Measurement
    #[serde(alias = "server-id")]
    pub server_id: Option<String>,
    #[serde(alias = "timeout-secs", alias = "timeout")]
    pub timeout_secs: Option<u64>,
    #[serde(alias = "speedtest-binary")]
    pub speedtest_binary: Option<String>,

    // Feature flags
    #[serde(alias = "enable-health")]
    pub enable_health: Option<bool>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            server_id: None,
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            speedtest_binary: Some(DEFAULT_BINARY.to_string()),
            enable_health: Some(true),
            log_level: Some("info".into()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Config {
    /// Measurement parameters derived from the effective config.
    pub fn measurement_settings(&self) -> MeasurementSettings {
        MeasurementSettings {
            server_id: self
                .server_id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            timeout: Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        }
    }

    pub fn speedtest_binary(&self) -> &str {
        self.speedtest_binary.as_deref().unwrap_or(DEFAULT_BINARY)
    }

    /// Log level from the config file, if it names a known level.
    pub fn parsed_log_level(&self) -> Option<LogLevel> {
        self.log_level
            .as_deref()
            .and_then(|s| LogLevel::from_str(s, true).ok())
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.timeout_secs == Some(0) {
        return Err("timeout_secs must be greater than 0".into());
    }

    if let Some(id) = cfg.server_id.as_deref().map(str::trim) {
        if !id.is_empty() && !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("Invalid server_id '{}', expected a numeric server id", id).into());
        }
    }

    if cfg.speedtest_binary.as_deref().is_some_and(|b| b.trim().is_empty()) {
        return Err("speedtest_binary must not be empty".into());
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if LogLevel::from_str(level, true).is_err() {
            return Err(format!(
                "Invalid log_level '{}', expected off, error, warn, info, debug or trace",
                level
            )
            .into());
        }
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file(cert, "certificate")?;
                check_pem_file(key, "private key")?;
            }
        }
    }

    Ok(())
}

/// Checks that a TLS file exists, is readable and not empty.
fn check_pem_file(path: &str, kind: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        return Err(format!("TLS {} file not found: {}", kind, path).into());
    }
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => {
            Err(format!("TLS {} file is empty: {}", kind, path).into())
        }
        Err(e) => {
            Err(format!("TLS {} file is not readable: {} ({})", kind, path, e).into())
        }
        Ok(_) => Ok(()),
    }
}

/// Resolves configuration from CLI args, environment, config file, and defaults.
/// This enforces precedence: CLI/env (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    // Measurement settings; an empty SPEEDTEST_SERVER_ID means "nearest server"
    if let Some(server_id) = &args.server_id {
        let trimmed = server_id.trim();
        config.server_id = (!trimmed.is_empty()).then(|| trimmed.to_string());
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = Some(timeout);
    }
    if let Some(binary) = &args.speedtest_binary {
        config.speedtest_binary = Some(binary.to_string_lossy().to_string());
    }

    if let Some(level) = args.log_level {
        if let Some(value) = level.to_possible_value() {
            config.log_level = Some(value.get_name().to_string());
        }
    }

    // Feature flags
    if args.disable_health {
        config.enable_health = Some(false);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Loads a config file, falling back to the default locations and then to defaults.
/// Fields missing from the file keep their default values.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let defaults = [
                "/etc/speedtest-exporter/config.yaml",
                "/etc/speedtest-exporter/config.yml",
                "/etc/speedtest-exporter/config.json",
                "./speedtest-exporter.yaml",
                "./speedtest-exporter.yml",
                "./speedtest-exporter.json",
            ];

            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(found) => PathBuf::from(found),
                None => return Ok(Config::default()),
            }
        }
    };

    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(&path)?;

    let file: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        Some("toml") => toml::from_str(&content)?,
        // Default to YAML
        _ => serde_yaml::from_str(&content)?,
    };
    info!("Loaded configuration from: {}", path.display());

    Ok(merge_with_defaults(file))
}

fn merge_with_defaults(file: Config) -> Config {
    let defaults = Config::default();
    Config {
        port: file.port.or(defaults.port),
        bind: file.bind.or(defaults.bind),
        server_id: file.server_id.or(defaults.server_id),
        timeout_secs: file.timeout_secs.or(defaults.timeout_secs),
        speedtest_binary: file.speedtest_binary.or(defaults.speedtest_binary),
        enable_health: file.enable_health.or(defaults.enable_health),
        log_level: file.log_level.or(defaults.log_level),
        enable_tls: file.enable_tls.or(defaults.enable_tls),
        tls_cert_path: file.tls_cert_path.or(defaults.tls_cert_path),
        tls_key_path: file.tls_key_path.or(defaults.tls_key_path),
    }
}

/// Shows configuration in requested format
pub fn show_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };

    println!("{output}");
    Ok(())
}
