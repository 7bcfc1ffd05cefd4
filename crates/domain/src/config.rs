//! Connection settings for a Consul agent, loaded from `.env`/process
//! variables or assembled programmatically.

use std::env;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tls::SslContextParameters;

/// Agent address used by the client builder when no `url` is configured.
pub const DEFAULT_CONSUL_URL: &str = "http://localhost:8500";

/// Immutable record of everything needed to open a session with a Consul
/// agent. Optional fields left as `None` keep the client builder's defaults.
///
/// Deserialized records go through the same blank-to-`None` normalization
/// as the `with_*` setters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawConsulConfiguration")]
pub struct ConsulConfiguration {
    url: Option<String>,
    ssl_context_parameters: Option<SslContextParameters>,
    acl_token: Option<String>,
    user_name: Option<String>,
    password: Option<String>,
    connect_timeout_millis: Option<u64>,
    read_timeout_millis: Option<u64>,
    write_timeout_millis: Option<u64>,
    ping_instance: bool,
}

impl Default for ConsulConfiguration {
    fn default() -> Self {
        Self {
            url: None,
            ssl_context_parameters: None,
            acl_token: None,
            user_name: None,
            password: None,
            connect_timeout_millis: None,
            read_timeout_millis: None,
            write_timeout_millis: None,
            ping_instance: true,
        }
    }
}

#[derive(Deserialize)]
struct RawConsulConfiguration {
    url: Option<String>,
    ssl_context_parameters: Option<SslContextParameters>,
    acl_token: Option<String>,
    user_name: Option<String>,
    password: Option<String>,
    connect_timeout_millis: Option<u64>,
    read_timeout_millis: Option<u64>,
    write_timeout_millis: Option<u64>,
    #[serde(default = "ping_by_default")]
    ping_instance: bool,
}

fn ping_by_default() -> bool {
    true
}

impl From<RawConsulConfiguration> for ConsulConfiguration {
    fn from(raw: RawConsulConfiguration) -> Self {
        Self {
            url: raw.url.and_then(non_blank),
            ssl_context_parameters: raw.ssl_context_parameters,
            acl_token: raw.acl_token.and_then(non_blank),
            user_name: raw.user_name.and_then(non_blank),
            password: raw.password.and_then(non_blank),
            connect_timeout_millis: raw.connect_timeout_millis,
            read_timeout_millis: raw.read_timeout_millis,
            write_timeout_millis: raw.write_timeout_millis,
            ping_instance: raw.ping_instance,
        }
    }
}

impl ConsulConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the `CONSUL_*` variables after hydrating `.env` (if present).
    /// Blank values are treated as unset; malformed numbers or booleans
    /// surface as `ConfigError`.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        let ssl_context_parameters = {
            let ca_file = get_optional_var("CONSUL_SSL_CA_FILE");
            let cert_file = get_optional_var("CONSUL_SSL_CERT_FILE");
            let key_file = get_optional_var("CONSUL_SSL_KEY_FILE");
            if ca_file.is_none() && cert_file.is_none() && key_file.is_none() {
                None
            } else {
                Some(SslContextParameters {
                    ca_file: ca_file.map(Into::into),
                    cert_file: cert_file.map(Into::into),
                    key_file: key_file.map(Into::into),
                    accept_invalid_certs: get_optional_bool("CONSUL_SSL_ACCEPT_INVALID_CERTS")?
                        .unwrap_or(false),
                })
            }
        };

        Ok(Self {
            url: get_optional_var("CONSUL_URL"),
            ssl_context_parameters,
            acl_token: get_optional_var("CONSUL_ACL_TOKEN"),
            user_name: get_optional_var("CONSUL_USER_NAME"),
            password: get_optional_var("CONSUL_PASSWORD"),
            connect_timeout_millis: get_optional_millis("CONSUL_CONNECT_TIMEOUT_MILLIS")?,
            read_timeout_millis: get_optional_millis("CONSUL_READ_TIMEOUT_MILLIS")?,
            write_timeout_millis: get_optional_millis("CONSUL_WRITE_TIMEOUT_MILLIS")?,
            ping_instance: get_optional_bool("CONSUL_PING_INSTANCE")?.unwrap_or(true),
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = non_blank(url.into());
        self
    }

    pub fn with_ssl_context_parameters(mut self, parameters: SslContextParameters) -> Self {
        self.ssl_context_parameters = Some(parameters);
        self
    }

    pub fn with_acl_token(mut self, token: impl Into<String>) -> Self {
        self.acl_token = non_blank(token.into());
        self
    }

    pub fn with_basic_auth(
        mut self,
        user_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.user_name = non_blank(user_name.into());
        self.password = non_blank(password.into());
        self
    }

    pub fn with_connect_timeout_millis(mut self, millis: u64) -> Self {
        self.connect_timeout_millis = Some(millis);
        self
    }

    pub fn with_read_timeout_millis(mut self, millis: u64) -> Self {
        self.read_timeout_millis = Some(millis);
        self
    }

    pub fn with_write_timeout_millis(mut self, millis: u64) -> Self {
        self.write_timeout_millis = Some(millis);
        self
    }

    pub fn with_ping_instance(mut self, ping: bool) -> Self {
        self.ping_instance = ping;
        self
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn ssl_context_parameters(&self) -> Option<&SslContextParameters> {
        self.ssl_context_parameters.as_ref()
    }

    pub fn acl_token(&self) -> Option<&str> {
        self.acl_token.as_deref()
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn connect_timeout_millis(&self) -> Option<u64> {
        self.connect_timeout_millis
    }

    pub fn read_timeout_millis(&self) -> Option<u64> {
        self.read_timeout_millis
    }

    pub fn write_timeout_millis(&self) -> Option<u64> {
        self.write_timeout_millis
    }

    pub fn ping_instance(&self) -> bool {
        self.ping_instance
    }

    /// Basic auth is only sent when both halves of the credential are set
    /// and non-blank.
    pub fn requires_basic_authentication(&self) -> bool {
        let present = |value: &Option<String>| {
            value.as_deref().is_some_and(|v| !v.trim().is_empty())
        };
        present(&self.user_name) && present(&self.password)
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub(crate) fn get_optional_var(key: &str) -> Option<String> {
    env::var(key).ok().and_then(non_blank)
}

fn get_optional_millis(key: &'static str) -> Result<Option<u64>, ConfigError> {
    get_optional_var(key)
        .map(|value| {
            value
                .parse()
                .map_err(|source| ConfigError::InvalidNumber { key, source })
        })
        .transpose()
}

fn get_optional_bool(key: &'static str) -> Result<Option<bool>, ConfigError> {
    get_optional_var(key)
        .map(|value| match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidBool { key, value }),
        })
        .transpose()
}

pub fn hydrate_env_file() -> Result<(), ConfigError> {
    if env::var_os("CONSUL_SKIP_DOTENV").is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(ConfigError::Dotenv { source: err }),
    }

    Ok(())
}

/// Errors emitted when `.env` hydration or environment parsing fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid integer in `{key}`: {source}")]
    InvalidNumber {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("invalid boolean in `{key}`: `{value}`")]
    InvalidBool { key: &'static str, value: String },
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}
