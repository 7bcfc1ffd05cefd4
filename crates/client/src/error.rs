use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while resolving options or finalizing a client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to read TLS material `{}`: {source}", path.display())]
    TlsMaterial {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TLS configuration: {0}")]
    Tls(String),
    #[error("invalid agent url `{0}`")]
    InvalidUrl(String),
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("agent ping returned status {0}")]
    PingStatus(reqwest::StatusCode),
}
