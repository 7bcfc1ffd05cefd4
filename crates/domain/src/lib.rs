//! Domain-level building blocks shared by the client and endpoint crates:
//! the immutable agent configuration, TLS material locations, and the
//! telemetry bootstrap used by binaries.

pub mod config;
pub mod telemetry;
pub mod tls;

pub use config::{ConfigError, ConsulConfiguration, DEFAULT_CONSUL_URL};
pub use telemetry::{init_telemetry, TelemetryConfig, TelemetryError, TelemetryGuard};
pub use tls::SslContextParameters;
