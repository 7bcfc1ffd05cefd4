//! Capabilities supplied by the host framework: the factories that turn an
//! endpoint into producers/consumers, and the collaborator traits those
//! factories return.

use std::sync::Arc;

use async_trait::async_trait;
use consul_endpoint_domain::ConsulConfiguration;
use serde_json::Value;

use crate::{endpoint::ConsulEndpoint, error::BoxError};

/// Sends messages to the agent.
#[async_trait]
pub trait Producer: Send + Sync {
    async fn process(&self, message: Value) -> Result<Value, BoxError>;
}

/// Receives messages from the agent and forwards them to a [`MessageSink`].
#[async_trait]
pub trait Consumer: Send + Sync {
    async fn start(&self) -> Result<(), BoxError>;
    async fn stop(&self) -> Result<(), BoxError>;
}

/// Destination for messages a consumer receives.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn accept(&self, message: Value) -> Result<(), BoxError>;
}

pub trait ProducerFactory: Send + Sync {
    fn create(
        &self,
        endpoint: Arc<ConsulEndpoint>,
        configuration: &ConsulConfiguration,
    ) -> Result<Box<dyn Producer>, BoxError>;
}

pub trait ConsumerFactory: Send + Sync {
    fn create(
        &self,
        endpoint: Arc<ConsulEndpoint>,
        configuration: &ConsulConfiguration,
        sink: Arc<dyn MessageSink>,
    ) -> Result<Box<dyn Consumer>, BoxError>;
}

impl<F> ProducerFactory for F
where
    F: Fn(Arc<ConsulEndpoint>, &ConsulConfiguration) -> Result<Box<dyn Producer>, BoxError>
        + Send
        + Sync,
{
    fn create(
        &self,
        endpoint: Arc<ConsulEndpoint>,
        configuration: &ConsulConfiguration,
    ) -> Result<Box<dyn Producer>, BoxError> {
        self(endpoint, configuration)
    }
}

impl<F> ConsumerFactory for F
where
    F: Fn(
            Arc<ConsulEndpoint>,
            &ConsulConfiguration,
            Arc<dyn MessageSink>,
        ) -> Result<Box<dyn Consumer>, BoxError>
        + Send
        + Sync,
{
    fn create(
        &self,
        endpoint: Arc<ConsulEndpoint>,
        configuration: &ConsulConfiguration,
        sink: Arc<dyn MessageSink>,
    ) -> Result<Box<dyn Consumer>, BoxError> {
        self(endpoint, configuration, sink)
    }
}
