use std::time::Duration;

use async_trait::async_trait;
use consul_endpoint_domain::DEFAULT_CONSUL_URL;
use tracing::debug;

use crate::{client::ConsulClient, error::ClientError, tls::TlsContext};

/// Option setters plus an async finalize step. Every setter is optional;
/// whatever is not called keeps the implementation's default.
#[async_trait]
pub trait ClientBuilder: Send {
    fn with_ping(&mut self, ping: bool);
    fn with_url(&mut self, url: &str);
    fn with_tls(&mut self, tls: TlsContext);
    fn with_acl_token(&mut self, token: &str);
    fn with_basic_auth(&mut self, user_name: &str, password: &str);
    fn with_connect_timeout(&mut self, timeout: Duration);
    /// [`ConsulClientBuilder`] merges the read and write budgets into one
    /// whole-request timeout, so a long Consul blocking query is cut off
    /// once their sum elapses. Leave both unset for blocking queries.
    fn with_read_timeout(&mut self, timeout: Duration);
    /// See [`ClientBuilder::with_read_timeout`].
    fn with_write_timeout(&mut self, timeout: Duration);

    /// Produces the client. May perform network I/O when pinging is enabled.
    async fn build(self: Box<Self>) -> Result<ConsulClient, ClientError>;
}

/// reqwest-backed builder talking to a real agent.
#[derive(Debug)]
pub struct ConsulClientBuilder {
    url: String,
    ping: bool,
    tls: Option<TlsContext>,
    acl_token: Option<String>,
    basic_auth: Option<(String, String)>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl Default for ConsulClientBuilder {
    fn default() -> Self {
        Self {
            url: DEFAULT_CONSUL_URL.to_string(),
            ping: true,
            tls: None,
            acl_token: None,
            basic_auth: None,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl ConsulClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// reqwest has no per-direction timeouts, so read and write budgets are
    /// summed into a single whole-request timeout. That bound covers the
    /// full response, unlike a per-read timeout.
    fn request_timeout(&self) -> Option<Duration> {
        match (self.read_timeout, self.write_timeout) {
            (None, None) => None,
            (read, write) => Some(read.unwrap_or_default() + write.unwrap_or_default()),
        }
    }
}

#[async_trait]
impl ClientBuilder for ConsulClientBuilder {
    fn with_ping(&mut self, ping: bool) {
        self.ping = ping;
    }

    fn with_url(&mut self, url: &str) {
        self.url = url.to_string();
    }

    fn with_tls(&mut self, tls: TlsContext) {
        self.tls = Some(tls);
    }

    fn with_acl_token(&mut self, token: &str) {
        self.acl_token = Some(token.to_string());
    }

    fn with_basic_auth(&mut self, user_name: &str, password: &str) {
        self.basic_auth = Some((user_name.to_string(), password.to_string()));
    }

    fn with_connect_timeout(&mut self, timeout: Duration) {
        self.connect_timeout = Some(timeout);
    }

    fn with_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = Some(timeout);
    }

    fn with_write_timeout(&mut self, timeout: Duration) {
        self.write_timeout = Some(timeout);
    }

    async fn build(self: Box<Self>) -> Result<ConsulClient, ClientError> {
        let base_url = reqwest::Url::parse(&self.url)
            .map_err(|_| ClientError::InvalidUrl(self.url.clone()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl(self.url.clone()));
        }
        let base_url = base_url.as_str().trim_end_matches('/').to_string();

        let mut http = reqwest::Client::builder();
        if let Some(timeout) = self.connect_timeout {
            http = http.connect_timeout(timeout);
        }
        if let Some(timeout) = self.request_timeout() {
            http = http.timeout(timeout);
        }

        let this = *self;
        if let Some(tls) = this.tls {
            let (roots, identity, accept_invalid_certs) = tls.into_parts();
            for cert in roots {
                http = http.add_root_certificate(cert);
            }
            if let Some(identity) = identity {
                http = http.identity(identity);
            }
            if accept_invalid_certs {
                http = http.danger_accept_invalid_certs(true);
            }
        }

        let client = ConsulClient::new(http.build()?, base_url, this.acl_token, this.basic_auth);

        if this.ping {
            debug!(url = client.base_url(), "pinging consul agent");
            client.ping().await?;
        }

        Ok(client)
    }
}
