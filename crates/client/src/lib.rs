//! Client-side plumbing for talking to a Consul agent: the builder
//! capability, the option-application step that seeds a builder from a
//! [`ConsulConfiguration`](consul_endpoint_domain::ConsulConfiguration), and
//! the reqwest-backed implementation used in production.

mod builder;
mod client;
mod error;
mod options;
mod tls;

pub use builder::{ClientBuilder, ConsulClientBuilder};
pub use client::ConsulClient;
pub use error::ClientError;
pub use options::apply_options;
pub use tls::{create_tls_context, TlsContext};
