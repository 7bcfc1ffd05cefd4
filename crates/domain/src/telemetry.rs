//! Process-wide logging and metrics bootstrap for binaries that embed the
//! endpoint. Libraries only emit `tracing` events and `metrics` counters.

use std::net::{AddrParseError, SocketAddr};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing_subscriber::{
    filter::ParseError, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError,
    EnvFilter,
};

use crate::config::{get_optional_var, hydrate_env_file};

static SUBSCRIBER: OnceCell<()> = OnceCell::new();
static RECORDER: OnceCell<PrometheusHandle> = OnceCell::new();

const DEFAULT_LOG_FILTER: &str = "info";

/// Log filter and optional Prometheus listener address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    log_filter: String,
    metrics_address: Option<String>,
}

impl TelemetryConfig {
    /// Reads `<PREFIX>_LOG_FILTER` and `<PREFIX>_METRICS_ADDRESS`; blank or
    /// missing values keep the defaults.
    pub fn from_env(prefix: &str) -> Self {
        let _ = hydrate_env_file();
        let prefix = prefix.trim().to_ascii_uppercase();

        Self {
            log_filter: get_optional_var(&format!("{prefix}_LOG_FILTER"))
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            metrics_address: get_optional_var(&format!("{prefix}_METRICS_ADDRESS")),
        }
    }

    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    pub fn metrics_address(&self) -> Option<&str> {
        self.metrics_address.as_deref()
    }
}

/// Handle to the installed Prometheus recorder.
#[derive(Clone)]
pub struct TelemetryGuard {
    recorder: PrometheusHandle,
}

impl TelemetryGuard {
    /// Current metrics in the Prometheus text format.
    pub fn render_metrics(&self) -> String {
        self.recorder.render()
    }
}

/// Installs the subscriber and the recorder on first call; later calls hand
/// back a guard over the already installed recorder.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    SUBSCRIBER.get_or_try_init(|| {
        let filter = EnvFilter::try_new(config.log_filter())?;
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
        Ok::<_, TelemetryError>(())
    })?;

    let recorder = RECORDER.get_or_try_init(|| {
        let mut builder = PrometheusBuilder::new();
        if let Some(address) = config.metrics_address() {
            let socket: SocketAddr =
                address
                    .parse()
                    .map_err(|source| TelemetryError::InvalidMetricsAddress {
                        address: address.to_string(),
                        source,
                    })?;
            builder = builder.with_http_listener(socket);
        }
        Ok::<_, TelemetryError>(builder.install_recorder()?)
    })?;

    Ok(TelemetryGuard {
        recorder: recorder.clone(),
    })
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    InvalidLogFilter(#[from] ParseError),
    #[error("failed to install tracing subscriber: {0}")]
    Tracing(#[from] TryInitError),
    #[error("invalid metrics address `{address}`: {source}")]
    InvalidMetricsAddress {
        address: String,
        #[source]
        source: AddrParseError,
    },
    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] BuildError),
}
