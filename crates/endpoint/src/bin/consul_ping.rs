//! Builds an endpoint from `CONSUL_*` variables and forces client
//! construction, reporting whether the agent is reachable.

use std::{env, io};

use consul_endpoint::{ConsulConfiguration, ConsulEndpoint};
use consul_endpoint_domain::{init_telemetry, ConfigError, TelemetryConfig, TelemetryError};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
enum PingError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Endpoint(#[from] consul_endpoint::EndpointError),
}

#[tokio::main]
async fn main() -> io::Result<()> {
    if let Err(err) = run().await {
        eprintln!("[consul-ping] failed: {err}");
        return Err(io::Error::other(err.to_string()));
    }

    Ok(())
}

async fn run() -> Result<(), PingError> {
    let configuration = ConsulConfiguration::load_from_env()?;
    let telemetry = init_telemetry(&TelemetryConfig::from_env("CONSUL"))?;

    let api_endpoint = env::var("CONSUL_API_ENDPOINT")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "agent".to_string());

    let endpoint = ConsulEndpoint::builder()
        .api_endpoint(api_endpoint)
        .configuration(configuration)
        .build()?;
    let client = endpoint.client().await?;

    info!(uri = %endpoint.endpoint_uri(), url = client.base_url(), "consul agent reachable");
    debug!(metrics = %telemetry.render_metrics(), "client construction metrics");
    println!("{} -> {}", endpoint.endpoint_uri(), client.base_url());
    Ok(())
}
