use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Locations of the PEM material used to build a TLS context for the agent
/// connection. Resolution into an actual context happens in the client crate
/// when the client is first built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SslContextParameters {
    /// Extra trust anchors (PEM bundle) for verifying the agent.
    pub ca_file: Option<PathBuf>,
    /// Client certificate chain for mutual TLS. Requires `key_file`.
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}
