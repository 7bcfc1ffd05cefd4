use std::fmt;

use reqwest::{Method, RequestBuilder};

use crate::error::ClientError;

const TOKEN_HEADER: &str = "X-Consul-Token";

/// Session handle for one Consul agent. Cheap to clone; every clone shares
/// the same connection pool.
#[derive(Clone)]
pub struct ConsulClient {
    http: reqwest::Client,
    base_url: String,
    acl_token: Option<String>,
    basic_auth: Option<(String, String)>,
}

impl ConsulClient {
    pub(crate) fn new(
        http: reqwest::Client,
        base_url: String,
        acl_token: Option<String>,
        basic_auth: Option<(String, String)>,
    ) -> Self {
        Self {
            http,
            base_url,
            acl_token,
            basic_auth,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_acl_token(&self) -> bool {
        self.acl_token.is_some()
    }

    pub fn basic_auth_user(&self) -> Option<&str> {
        self.basic_auth.as_ref().map(|(user, _)| user.as_str())
    }

    /// Starts a request against `path` (e.g. `/v1/kv/foo`) with the ACL
    /// token and basic auth credentials already attached.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut request = self.http.request(method, url);
        if let Some(token) = &self.acl_token {
            request = request.header(TOKEN_HEADER, token);
        }
        if let Some((user, password)) = &self.basic_auth {
            request = request.basic_auth(user, Some(password));
        }
        request
    }

    /// Liveness check against `/v1/agent/self`.
    pub async fn ping(&self) -> Result<(), ClientError> {
        let response = self.request(Method::GET, "/v1/agent/self").send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::PingStatus(status));
        }
        Ok(())
    }
}

impl fmt::Debug for ConsulClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsulClient")
            .field("base_url", &self.base_url)
            .field("acl_token", &self.acl_token.as_ref().map(|_| "<redacted>"))
            .field("basic_auth_user", &self.basic_auth_user())
            .finish()
    }
}
