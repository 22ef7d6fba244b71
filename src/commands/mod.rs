//! CLI command implementations for speedtest-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Configuration and speedtest CLI validation
//! - `config`: Configuration file generation
//! - `test`: One-off measurement

pub mod check;
pub mod config;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use test::command_test;
