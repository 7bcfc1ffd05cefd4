use std::{fmt, sync::Arc};

use consul_endpoint_client::{apply_options, ClientBuilder, ConsulClient, ConsulClientBuilder};
use consul_endpoint_domain::ConsulConfiguration;
use metrics::counter;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::{
    error::{BoxError, EndpointError},
    factory::{Consumer, ConsumerFactory, MessageSink, Producer, ProducerFactory},
};

/// URI scheme the endpoint is addressed by, e.g. `consul://kv`.
pub const SCHEME: &str = "consul";

/// Source of fresh, unconfigured client builders. Called once per
/// construction attempt.
pub type ClientBuilderSource = Arc<dyn Fn() -> Box<dyn ClientBuilder> + Send + Sync>;

/// One Consul address bound to its configuration, its optional
/// producer/consumer factories, and a lazily built client shared by
/// everything created from it.
pub struct ConsulEndpoint {
    api_endpoint: String,
    configuration: ConsulConfiguration,
    producer_factory: Option<Arc<dyn ProducerFactory>>,
    consumer_factory: Option<Arc<dyn ConsumerFactory>>,
    builder_source: ClientBuilderSource,
    client: OnceCell<Arc<ConsulClient>>,
}

impl ConsulEndpoint {
    pub fn builder() -> ConsulEndpointBuilder {
        ConsulEndpointBuilder::new()
    }

    pub fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }

    pub fn configuration(&self) -> &ConsulConfiguration {
        &self.configuration
    }

    pub fn endpoint_uri(&self) -> String {
        format!("{SCHEME}://{}", self.api_endpoint)
    }

    /// Registries must reuse one instance per address so the client is
    /// shared.
    pub fn is_singleton(&self) -> bool {
        true
    }

    pub fn create_producer(self: &Arc<Self>) -> Result<Box<dyn Producer>, EndpointError> {
        let factory = self
            .producer_factory
            .as_ref()
            .ok_or_else(|| self.unsupported("producer"))?;

        factory
            .create(Arc::clone(self), &self.configuration)
            .map_err(EndpointError::Factory)
    }

    pub fn create_consumer(
        self: &Arc<Self>,
        sink: Arc<dyn MessageSink>,
    ) -> Result<Box<dyn Consumer>, EndpointError> {
        let factory = self
            .consumer_factory
            .as_ref()
            .ok_or_else(|| self.unsupported("consumer"))?;

        factory
            .create(Arc::clone(self), &self.configuration, sink)
            .map_err(EndpointError::Factory)
    }

    /// Returns the shared client, building it on first use.
    ///
    /// Concurrent first callers wait on a single construction. A failed
    /// construction leaves the slot empty, so the next call starts over.
    pub async fn client(&self) -> Result<Arc<ConsulClient>, EndpointError> {
        let client = self
            .client
            .get_or_try_init(|| self.build_client())
            .await?;
        Ok(Arc::clone(client))
    }

    /// The client if it has already been built; never triggers construction.
    pub fn cached_client(&self) -> Option<Arc<ConsulClient>> {
        self.client.get().cloned()
    }

    async fn build_client(&self) -> Result<Arc<ConsulClient>, EndpointError> {
        debug!(api_endpoint = %self.api_endpoint, "building consul client");

        let mut builder = (self.builder_source)();
        let built = match apply_options(&mut *builder, &self.configuration) {
            Ok(()) => builder.build().await,
            Err(err) => Err(err),
        };

        match built {
            Ok(client) => {
                counter!("consul_client_builds_total", "result" => "ok").increment(1);
                info!(
                    api_endpoint = %self.api_endpoint,
                    url = client.base_url(),
                    "consul client ready"
                );
                Ok(Arc::new(client))
            }
            Err(err) => {
                counter!("consul_client_builds_total", "result" => "error").increment(1);
                warn!(api_endpoint = %self.api_endpoint, error = %err, "consul client construction failed");
                Err(err.into())
            }
        }
    }

    fn unsupported(&self, role: &'static str) -> EndpointError {
        EndpointError::UnsupportedOperation {
            role,
            api_endpoint: self.api_endpoint.clone(),
        }
    }
}

impl fmt::Debug for ConsulEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsulEndpoint")
            .field("api_endpoint", &self.api_endpoint)
            .field("configuration", &self.configuration)
            .field("has_producer", &self.producer_factory.is_some())
            .field("has_consumer", &self.consumer_factory.is_some())
            .field("client_built", &self.client.initialized())
            .finish()
    }
}

/// Collects the endpoint's parts; `build` rejects a missing address or
/// configuration.
#[derive(Default)]
pub struct ConsulEndpointBuilder {
    api_endpoint: Option<String>,
    configuration: Option<ConsulConfiguration>,
    producer_factory: Option<Arc<dyn ProducerFactory>>,
    consumer_factory: Option<Arc<dyn ConsumerFactory>>,
    builder_source: Option<ClientBuilderSource>,
}

impl ConsulEndpointBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_endpoint(mut self, api_endpoint: impl Into<String>) -> Self {
        self.api_endpoint = Some(api_endpoint.into());
        self
    }

    pub fn configuration(mut self, configuration: ConsulConfiguration) -> Self {
        self.configuration = Some(configuration);
        self
    }

    pub fn producer_factory(mut self, factory: impl ProducerFactory + 'static) -> Self {
        self.producer_factory = Some(Arc::new(factory));
        self
    }

    pub fn consumer_factory(mut self, factory: impl ConsumerFactory + 'static) -> Self {
        self.consumer_factory = Some(Arc::new(factory));
        self
    }

    /// Registers a closure as the producer factory.
    pub fn producer_fn<F>(self, factory: F) -> Self
    where
        F: Fn(Arc<ConsulEndpoint>, &ConsulConfiguration) -> Result<Box<dyn Producer>, BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.producer_factory(factory)
    }

    /// Registers a closure as the consumer factory.
    pub fn consumer_fn<F>(self, factory: F) -> Self
    where
        F: Fn(
                Arc<ConsulEndpoint>,
                &ConsulConfiguration,
                Arc<dyn MessageSink>,
            ) -> Result<Box<dyn Consumer>, BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.consumer_factory(factory)
    }

    /// Overrides where client builders come from. Defaults to
    /// [`ConsulClientBuilder::new`].
    pub fn client_builder<F>(mut self, source: F) -> Self
    where
        F: Fn() -> Box<dyn ClientBuilder> + Send + Sync + 'static,
    {
        self.builder_source = Some(Arc::new(source));
        self
    }

    pub fn build(self) -> Result<Arc<ConsulEndpoint>, EndpointError> {
        // Blank names are rejected; anything else is kept exactly as given.
        let api_endpoint = self
            .api_endpoint
            .filter(|value| !value.trim().is_empty());

        let mut missing = Vec::new();
        if api_endpoint.is_none() {
            missing.push("api_endpoint");
        }
        if self.configuration.is_none() {
            missing.push("configuration");
        }

        let (Some(api_endpoint), Some(configuration)) = (api_endpoint, self.configuration) else {
            return Err(EndpointError::InvalidArgument { missing });
        };

        let builder_source = self.builder_source.unwrap_or_else(default_builder_source);

        Ok(Arc::new(ConsulEndpoint {
            api_endpoint,
            configuration,
            producer_factory: self.producer_factory,
            consumer_factory: self.consumer_factory,
            builder_source,
            client: OnceCell::new(),
        }))
    }
}

fn default_builder_source() -> ClientBuilderSource {
    Arc::new(|| Box::new(ConsulClientBuilder::new()) as Box<dyn ClientBuilder>)
}
