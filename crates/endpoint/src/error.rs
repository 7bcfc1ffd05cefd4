use consul_endpoint_client::ClientError;
use thiserror::Error;

/// Error type produced by producer/consumer factories and collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum EndpointError {
    /// A required construction parameter was absent.
    #[error("missing required endpoint parameter(s): {}", missing.join(", "))]
    InvalidArgument { missing: Vec<&'static str> },
    /// No factory was registered for the requested role.
    #[error("no {role} for {api_endpoint}")]
    UnsupportedOperation {
        role: &'static str,
        api_endpoint: String,
    },
    #[error("failed to construct consul client: {0}")]
    BackendConstruction(#[from] ClientError),
    /// Failure raised by a factory, passed through as-is.
    #[error(transparent)]
    Factory(BoxError),
}
