//! CLI argument definitions for trafficwatch.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.
//! Every override is optional so that unset flags fall through to the
//! environment, the config file and finally the built-in defaults.

use std::path::PathBuf;

use clap::Parser;

use trafficwatch_core::config::TrafficwatchConfig;

/// HTTP access log monitor.
///
/// Follows an access log, prints periodic traffic reports and raises a
/// high-traffic alert when the average request rate over the sliding
/// window exceeds the threshold.
#[derive(Parser, Debug, Default)]
#[command(name = "trafficwatch")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to a trafficwatch.toml configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Access log file to follow [default: /tmp/access.log].
    #[arg(short, long)]
    pub filename: Option<String>,

    /// High-traffic threshold in requests per second [default: 10.0].
    #[arg(long)]
    pub qps: Option<f64>,

    /// Number of sections listed in each report [default: 5].
    #[arg(long)]
    pub top: Option<usize>,

    /// Sliding window span in seconds [default: 120].
    #[arg(long)]
    pub window_secs: Option<u64>,

    /// Seconds between reports [default: 10].
    #[arg(long)]
    pub interval_secs: Option<u64>,

    /// Report format.
    #[arg(long, value_parser = ["text", "json"])]
    pub output: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without following the log.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of an already-loaded configuration.
    pub fn apply_overrides(&self, config: &mut TrafficwatchConfig) {
        if let Some(filename) = &self.filename {
            config.monitor.filename = filename.clone();
        }
        if let Some(qps) = self.qps {
            config.monitor.rate_threshold = qps;
        }
        if let Some(top) = self.top {
            config.monitor.top_n = top;
        }
        if let Some(window_secs) = self.window_secs {
            config.monitor.window_secs = window_secs;
        }
        if let Some(interval_secs) = self.interval_secs {
            config.monitor.report_interval_secs = interval_secs;
        }
        if let Some(output) = &self.output {
            config.monitor.output_format = output.clone();
        }
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
    }
}
