use std::{fs, path::Path};

use consul_endpoint_domain::SslContextParameters;
use reqwest::{Certificate, Identity};

use crate::error::ClientError;

/// Resolved TLS material ready to be installed on the HTTP client.
#[derive(Debug)]
pub struct TlsContext {
    root_certificates: Vec<Certificate>,
    identity: Option<Identity>,
    accept_invalid_certs: bool,
}

impl TlsContext {
    pub fn root_certificates(&self) -> &[Certificate] {
        &self.root_certificates
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn accept_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }

    pub(crate) fn into_parts(self) -> (Vec<Certificate>, Option<Identity>, bool) {
        (
            self.root_certificates,
            self.identity,
            self.accept_invalid_certs,
        )
    }
}

/// Reads the PEM files named by `parameters` and turns them into a
/// [`TlsContext`]. A client identity needs both the certificate and the key.
pub fn create_tls_context(parameters: &SslContextParameters) -> Result<TlsContext, ClientError> {
    let mut root_certificates = Vec::new();
    if let Some(ca_file) = parameters.ca_file.as_deref() {
        root_certificates = parse_ca_bundle(ca_file, &read_pem(ca_file)?)?;
    }

    let identity = match (
        parameters.cert_file.as_deref(),
        parameters.key_file.as_deref(),
    ) {
        (Some(cert_file), Some(key_file)) => {
            let mut pem = read_pem(cert_file)?;
            pem.push(b'\n');
            pem.extend(read_pem(key_file)?);
            let identity = Identity::from_pem(&pem)
                .map_err(|err| ClientError::Tls(format!("client identity: {err}")))?;
            Some(identity)
        }
        (None, None) => None,
        _ => {
            return Err(ClientError::Tls(
                "client identity requires both cert_file and key_file".to_string(),
            ))
        }
    };

    Ok(TlsContext {
        root_certificates,
        identity,
        accept_invalid_certs: parameters.accept_invalid_certs,
    })
}

/// Decodes every CERTIFICATE block in `pem`. A bundle without a single
/// decodable certificate is rejected rather than yielding an empty trust set.
fn parse_ca_bundle(path: &Path, pem: &[u8]) -> Result<Vec<Certificate>, ClientError> {
    let blocks = rustls_pemfile::certs(&mut &pem[..])
        .map_err(|err| ClientError::Tls(format!("{}: {err}", path.display())))?;
    if blocks.is_empty() {
        return Err(ClientError::Tls(format!(
            "{}: no PEM certificate found",
            path.display()
        )));
    }

    blocks
        .iter()
        .map(|der| {
            Certificate::from_der(der)
                .map_err(|err| ClientError::Tls(format!("{}: {err}", path.display())))
        })
        .collect()
}

fn read_pem(path: &Path) -> Result<Vec<u8>, ClientError> {
    fs::read(path).map_err(|source| ClientError::TlsMaterial {
        path: path.to_path_buf(),
        source,
    })
}
