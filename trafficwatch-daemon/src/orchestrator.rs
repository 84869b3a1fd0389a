//! Daemon orchestration -- configuration assembly and pipeline lifecycle.
//!
//! The [`Orchestrator`] is the central coordinator of `trafficwatch`.
//! It resolves the layered configuration, installs the metrics recorder,
//! builds the traffic monitor pipeline, and runs it until a shutdown
//! signal arrives or the pipeline stops on its own.
//!
//! # Configuration Precedence
//!
//! 1. Command-line flags
//! 2. Environment variables (`TRAFFICWATCH_{SECTION}_{FIELD}`)
//! 3. Configuration file (`--config`)
//! 4. Built-in defaults

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::Result;

use trafficwatch_core::config::TrafficwatchConfig;
use trafficwatch_core::pipeline::{HealthStatus, Pipeline};
use trafficwatch_monitor::{MonitorConfig, MonitorPipeline, MonitorPipelineBuilder, ReportWriter};

use crate::cli::DaemonCli;
use crate::metrics_server;

/// How often the run loop polls pipeline health.
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Point-in-time health report for the daemon.
#[derive(Debug, Clone)]
pub struct DaemonHealth {
    /// Pipeline health status.
    pub status: HealthStatus,
    /// Daemon uptime in seconds since build.
    pub uptime_secs: u64,
    /// Lines parsed and folded into the statistics.
    pub processed: u64,
    /// Lines rejected by the parser.
    pub parse_errors: u64,
}

/// Resolve the effective configuration from file, environment and CLI.
///
/// A missing `--config` means "defaults only"; a `--config` that points
/// at a missing file is an error.
pub async fn load_config(cli: &DaemonCli) -> Result<TrafficwatchConfig> {
    let mut config = match &cli.config {
        Some(path) => TrafficwatchConfig::from_file(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?,
        None => TrafficwatchConfig::default(),
    };

    config.apply_env_overrides();
    cli.apply_overrides(&mut config);

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
    Ok(config)
}

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: TrafficwatchConfig,
    /// The traffic monitor pipeline.
    pipeline: MonitorPipeline,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Build from an already-resolved configuration, reporting to stdout.
    pub fn build_from_config(config: TrafficwatchConfig) -> Result<Self> {
        Self::assemble(config, None)
    }

    /// Build with a custom report writer instead of stdout.
    ///
    /// Useful for testing or for embedding the monitor.
    pub fn build_with_writer(config: TrafficwatchConfig, writer: ReportWriter) -> Result<Self> {
        Self::assemble(config, Some(writer))
    }

    fn assemble(config: TrafficwatchConfig, writer: Option<ReportWriter>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // Install metrics recorder before the pipeline records anything
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let monitor_config = MonitorConfig::from_core(&config.monitor)
            .map_err(|e| anyhow::anyhow!("invalid monitor config: {}", e))?;

        let mut builder = MonitorPipelineBuilder::new().config(monitor_config);
        if let Some(writer) = writer {
            builder = builder.writer(writer);
        }
        let pipeline = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build traffic monitor: {}", e))?;

        tracing::info!(
            filename = %config.monitor.filename,
            rate_threshold = config.monitor.rate_threshold,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            pipeline,
            start_time: Instant::now(),
        })
    }

    /// Start the pipeline and block until SIGTERM or SIGINT.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    /// - The pipeline stopping itself (abort policy, unrecoverable tail error)
    pub async fn run(&mut self) -> Result<()> {
        let signals = wait_for_shutdown_signal();
        self.run_until(async move {
            match signals.await {
                Ok(signal) => tracing::info!(signal = signal, "shutdown signal received"),
                Err(e) => {
                    tracing::error!(error = %e, "signal handling failed, running until pipeline stops");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await
    }

    /// Start the pipeline and run until `shutdown` resolves.
    ///
    /// Returns an error if the pipeline stopped because of an internal failure.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.pipeline
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start traffic monitor: {}", e))?;

        let pipeline_stopped = self.pipeline.shutdown_token();
        let mut health_ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + HEALTH_CHECK_INTERVAL,
            HEALTH_CHECK_INTERVAL,
        );
        tokio::pin!(shutdown);

        tracing::info!(
            filename = %self.config.monitor.filename,
            report_interval_secs = self.config.monitor.report_interval_secs,
            "entering main event loop"
        );
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = pipeline_stopped.cancelled() => {
                    tracing::warn!("traffic monitor stopped on its own");
                    break;
                }
                _ = health_ticker.tick() => {
                    let health = self.health().await;
                    if health.status.is_healthy() {
                        tracing::debug!(
                            uptime_secs = health.uptime_secs,
                            processed = health.processed,
                            parse_errors = health.parse_errors,
                            "health check"
                        );
                    } else {
                        tracing::warn!(status = %health.status, "traffic monitor unhealthy");
                    }
                }
            }
        }

        self.shutdown().await?;

        match self.pipeline.failure() {
            Some(reason) => Err(anyhow::anyhow!("traffic monitor failed: {}", reason)),
            None => Ok(()),
        }
    }

    /// Stop the pipeline and wait for its tasks.
    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping traffic monitor");
        self.pipeline
            .stop()
            .await
            .map_err(|e| anyhow::anyhow!("failed to stop traffic monitor: {}", e))
    }

    /// Get the current health report.
    pub async fn health(&self) -> DaemonHealth {
        DaemonHealth {
            status: self.pipeline.health_check().await,
            uptime_secs: self.start_time.elapsed().as_secs(),
            processed: self.pipeline.processed_count(),
            parse_errors: self.pipeline.parse_error_count(),
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
