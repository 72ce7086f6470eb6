//! # Observability
//!
//! Logging and metrics for the container engine.
//!
//! Logs go through `tracing`; the output layer is picked by [`LogFormat`]
//! and filtered by `RUST_LOG`, falling back to a level derived from the
//! CLI verbosity. Codec, cache and container metrics go through the
//! `metrics` facade and are exported only when a Prometheus port is set.
//!
//! ```ignore
//! observability::init_with_config(
//!     ObservabilityConfig::for_verbosity(1, false).with_metrics_port(Some(9000)),
//! )?;
//! observability::record_container_io("save", frames, bytes);
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

pub use crate::metrics::{
    describe_metrics, record_cache_error, record_container_io, record_frame_decoded,
    record_frame_encoded, record_queue_depth, CompressionAggregator, CompressionSummary,
    RunningStats, StatsSummary,
};

/// Crates whose own logs stay at `warn` unless `RUST_LOG` says otherwise
const QUIET_DEPENDENCIES: &[&str] = &["metrics_exporter_prometheus", "hyper", "tokio"];

/// Initialize with defaults (JSON logs, no exporter)
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// Observability configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
    /// Level for the engine's own crates when `RUST_LOG` is not set
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: None,
            default_log_level: "info".to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// Map `-v` repetitions and `-q` to a default level
    pub fn for_verbosity(verbose: u8, quiet: bool) -> Self {
        let level = match (quiet, verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        Self {
            default_log_level: level.to_string(),
            ..Self::default()
        }
    }

    pub fn with_log_format(mut self, log_format: LogFormat) -> Self {
        self.log_format = log_format;
        self
    }

    pub fn with_metrics_port(mut self, metrics_port: Option<u16>) -> Self {
        self.metrics_port = metrics_port;
        self
    }

    /// Filter directives used when `RUST_LOG` is absent
    fn default_directives(&self) -> String {
        let mut directives = vec![self.default_log_level.clone()];
        directives.extend(QUIET_DEPENDENCIES.iter().map(|krate| format!("{krate}=warn")));
        directives.join(",")
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured JSON lines, with thread names so cache workers are visible
    #[default]
    Json,
    /// Human-readable multi-line
    Pretty,
    /// Single line on stderr, keeping stdout free for command output
    Compact,
}

impl LogFormat {
    fn layer(self) -> Box<dyn Layer<Registry> + Send + Sync> {
        match self {
            LogFormat::Json => fmt::layer()
                .json()
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .boxed(),
            LogFormat::Pretty => fmt::layer().pretty().with_thread_names(true).boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr)
                .boxed(),
        }
    }
}

/// Initialize tracing and, if configured, the Prometheus exporter
///
/// # Errors
/// Fails if a global subscriber is already set or the exporter cannot bind.
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directives()));

    tracing_subscriber::registry()
        .with(config.log_format.layer())
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .context("Failed to install Prometheus recorder")?;
        describe_metrics();
        tracing::info!(port, "Prometheus metrics endpoint initialized");
    }

    tracing::debug!(
        log_format = ?config.log_format,
        level = %config.default_log_level,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );
    Ok(())
}
