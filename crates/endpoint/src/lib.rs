//! Binds a Consul address to its configuration and hands out producers,
//! consumers, and one lazily constructed client shared by all of them.
//!
//! ```no_run
//! # async fn demo() -> Result<(), consul_endpoint::EndpointError> {
//! use consul_endpoint::{ConsulConfiguration, ConsulEndpoint};
//!
//! let endpoint = ConsulEndpoint::builder()
//!     .api_endpoint("kv")
//!     .configuration(ConsulConfiguration::new().with_url("http://localhost:8500"))
//!     .build()?;
//! let client = endpoint.client().await?;
//! # let _ = client;
//! # Ok(())
//! # }
//! ```

mod endpoint;
mod error;
mod factory;

#[cfg(test)]
mod tests;

pub use consul_endpoint_client::{ClientBuilder, ClientError, ConsulClient};
pub use consul_endpoint_domain::{ConsulConfiguration, SslContextParameters};
pub use endpoint::{ClientBuilderSource, ConsulEndpoint, ConsulEndpointBuilder, SCHEME};
pub use error::{BoxError, EndpointError};
pub use factory::{Consumer, ConsumerFactory, MessageSink, Producer, ProducerFactory};
