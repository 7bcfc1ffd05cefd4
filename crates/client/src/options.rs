use std::time::Duration;

use consul_endpoint_domain::ConsulConfiguration;
use tracing::debug;

use crate::{builder::ClientBuilder, error::ClientError, tls::create_tls_context};

/// Seeds `builder` from `configuration`, calling a setter only when the
/// matching option is present. The order is fixed: ping, url, TLS, ACL
/// token, basic auth, then connect/read/write timeouts.
///
/// Only TLS resolution can fail; nothing here touches the network.
pub fn apply_options(
    builder: &mut dyn ClientBuilder,
    configuration: &ConsulConfiguration,
) -> Result<(), ClientError> {
    builder.with_ping(configuration.ping_instance());

    if let Some(url) = configuration.url() {
        builder.with_url(url);
    }
    if let Some(parameters) = configuration.ssl_context_parameters() {
        builder.with_tls(create_tls_context(parameters)?);
    }
    if let Some(token) = configuration.acl_token() {
        builder.with_acl_token(token);
    }
    if configuration.requires_basic_authentication() {
        if let (Some(user_name), Some(password)) =
            (configuration.user_name(), configuration.password())
        {
            builder.with_basic_auth(user_name, password);
        }
    }
    if let Some(millis) = configuration.connect_timeout_millis() {
        builder.with_connect_timeout(Duration::from_millis(millis));
    }
    if let Some(millis) = configuration.read_timeout_millis() {
        builder.with_read_timeout(Duration::from_millis(millis));
    }
    if let Some(millis) = configuration.write_timeout_millis() {
        builder.with_write_timeout(Duration::from_millis(millis));
    }

    debug!(
        url = configuration.url(),
        ping = configuration.ping_instance(),
        tls = configuration.ssl_context_parameters().is_some(),
        basic_auth = configuration.requires_basic_authentication(),
        "applied consul client options"
    );
    Ok(())
}
