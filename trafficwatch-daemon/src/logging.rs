//! Logging initialization for trafficwatch.
//!
//! Configures `tracing-subscriber` from the `[general]` section of
//! `TrafficwatchConfig`. Logs always go to stderr so that stdout
//! carries only reports and alert messages.

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use trafficwatch_core::config::GeneralConfig;

/// Boxed formatting layer so both formats share one init path.
type FormatLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Build the `EnvFilter`.
///
/// `RUST_LOG` takes precedence over `config.log_level`.
pub fn build_filter(config: &GeneralConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.log_level)
        .map_err(|e| anyhow::anyhow!("invalid log level '{}': {}", config.log_level, e))
}

fn format_layer(log_format: &str) -> Result<FormatLayer> {
    let layer: FormatLayer = match log_format {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_writer(std::io::stderr)
            .boxed(),
        "pretty" => tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .boxed(),
        other => {
            return Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                other
            ));
        }
    };
    Ok(layer)
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
///
/// # Formats
///
/// * `"json"` - one JSON object per event
/// * `"pretty"` - human-readable multi-line output (default)
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let layer = format_layer(&config.log_format)?;
    let filter = build_filter(config)?;

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| {
            anyhow::anyhow!(
                "failed to initialize {} tracing subscriber: {}",
                config.log_format,
                e
            )
        })
}
