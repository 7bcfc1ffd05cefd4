use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use consul_endpoint_client::{
    ClientBuilder, ClientError, ConsulClient, ConsulClientBuilder, TlsContext,
};
use consul_endpoint_domain::{ConsulConfiguration, SslContextParameters};
use serde_json::{json, Value};

use crate::{
    BoxError, Consumer, ConsumerFactory, ConsulEndpoint, EndpointError, MessageSink, Producer,
    ProducerFactory,
};

fn offline_configuration() -> ConsulConfiguration {
    ConsulConfiguration::new()
        .with_url("http://localhost:8500")
        .with_ping_instance(false)
}

fn endpoint() -> Arc<ConsulEndpoint> {
    ConsulEndpoint::builder()
        .api_endpoint("kv")
        .configuration(offline_configuration())
        .build()
        .expect("endpoint builds")
}

// --- builder fixtures -------------------------------------------------------

/// Delegates to the real builder with pinging disabled, counting finalize
/// calls and failing the first `failures` of them.
struct CountingBuilder {
    builds: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
    inner: ConsulClientBuilder,
}

#[async_trait]
impl ClientBuilder for CountingBuilder {
    fn with_ping(&mut self, _ping: bool) {
        self.inner.with_ping(false);
    }

    fn with_url(&mut self, url: &str) {
        self.inner.with_url(url);
    }

    fn with_tls(&mut self, tls: TlsContext) {
        self.inner.with_tls(tls);
    }

    fn with_acl_token(&mut self, token: &str) {
        self.inner.with_acl_token(token);
    }

    fn with_basic_auth(&mut self, user_name: &str, password: &str) {
        self.inner.with_basic_auth(user_name, password);
    }

    fn with_connect_timeout(&mut self, timeout: Duration) {
        self.inner.with_connect_timeout(timeout);
    }

    fn with_read_timeout(&mut self, timeout: Duration) {
        self.inner.with_read_timeout(timeout);
    }

    fn with_write_timeout(&mut self, timeout: Duration) {
        self.inner.with_write_timeout(timeout);
    }

    async fn build(self: Box<Self>) -> Result<ConsulClient, ClientError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ClientError::Tls("agent rejected handshake".to_string()));
        }

        let this = *self;
        Box::new(this.inner).build().await
    }
}

struct Counters {
    builds: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
}

fn counting_endpoint(failures: usize) -> (Arc<ConsulEndpoint>, Counters) {
    let builds = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(failures));
    let counters = Counters {
        builds: Arc::clone(&builds),
        failures: Arc::clone(&failures),
    };

    let endpoint = ConsulEndpoint::builder()
        .api_endpoint("catalog")
        .configuration(offline_configuration().with_acl_token("acl"))
        .client_builder(move || {
            Box::new(CountingBuilder {
                builds: Arc::clone(&builds),
                failures: Arc::clone(&failures),
                inner: ConsulClientBuilder::new(),
            }) as Box<dyn ClientBuilder>
        })
        .build()
        .expect("endpoint builds");

    (endpoint, counters)
}

// --- factory fixtures -------------------------------------------------------

struct EchoProducer {
    api_endpoint: String,
}

#[async_trait]
impl Producer for EchoProducer {
    async fn process(&self, message: Value) -> Result<Value, BoxError> {
        Ok(json!({ "endpoint": self.api_endpoint, "echo": message }))
    }
}

#[derive(Clone, Default)]
struct RecordingProducerFactory {
    seen: Arc<Mutex<Vec<(Arc<ConsulEndpoint>, ConsulConfiguration)>>>,
}

impl ProducerFactory for RecordingProducerFactory {
    fn create(
        &self,
        endpoint: Arc<ConsulEndpoint>,
        configuration: &ConsulConfiguration,
    ) -> Result<Box<dyn Producer>, BoxError> {
        let api_endpoint = endpoint.api_endpoint().to_string();
        self.seen
            .lock()
            .unwrap()
            .push((endpoint, configuration.clone()));
        Ok(Box::new(EchoProducer { api_endpoint }))
    }
}

#[derive(Debug)]
struct Boom;

impl fmt::Display for Boom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "factory exploded")
    }
}

impl std::error::Error for Boom {}

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<Value>>,
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn accept(&self, message: Value) -> Result<(), BoxError> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

struct ForwardingConsumer {
    sink: Arc<dyn MessageSink>,
}

#[async_trait]
impl Consumer for ForwardingConsumer {
    async fn start(&self) -> Result<(), BoxError> {
        self.sink.accept(json!({ "Key": "service/web", "Value": "on" })).await
    }

    async fn stop(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

struct ForwardingConsumerFactory;

impl ConsumerFactory for ForwardingConsumerFactory {
    fn create(
        &self,
        _endpoint: Arc<ConsulEndpoint>,
        _configuration: &ConsulConfiguration,
        sink: Arc<dyn MessageSink>,
    ) -> Result<Box<dyn Consumer>, BoxError> {
        Ok(Box::new(ForwardingConsumer { sink }))
    }
}

// --- construction -----------------------------------------------------------

#[test]
fn construction_succeeds_and_endpoint_is_singleton() {
    let endpoint = endpoint();
    assert!(endpoint.is_singleton());
    assert_eq!(endpoint.api_endpoint(), "kv");
    assert_eq!(endpoint.endpoint_uri(), "consul://kv");
    assert_eq!(endpoint.configuration(), &offline_configuration());
    assert!(endpoint.cached_client().is_none());
}

#[test]
fn construction_requires_api_endpoint() {
    let err = ConsulEndpoint::builder()
        .configuration(offline_configuration())
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        EndpointError::InvalidArgument { ref missing } if missing == &["api_endpoint"]
    ));

    let err = ConsulEndpoint::builder()
        .api_endpoint("   ")
        .configuration(offline_configuration())
        .build()
        .unwrap_err();
    assert!(matches!(err, EndpointError::InvalidArgument { .. }));
}

#[test]
fn api_endpoint_is_kept_verbatim() {
    let endpoint = ConsulEndpoint::builder()
        .api_endpoint(" kv ")
        .configuration(offline_configuration())
        .build()
        .expect("non-blank name is accepted");
    assert_eq!(endpoint.api_endpoint(), " kv ");
    assert_eq!(endpoint.endpoint_uri(), "consul:// kv ");

    let err = endpoint.create_producer().err().expect("no producer factory");
    assert_eq!(err.to_string(), "no producer for  kv ");
}

#[test]
fn construction_requires_configuration() {
    let err = ConsulEndpoint::builder()
        .api_endpoint("kv")
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        EndpointError::InvalidArgument { ref missing } if missing == &["configuration"]
    ));
}

#[test]
fn construction_reports_every_missing_parameter() {
    let err = ConsulEndpoint::builder().build().unwrap_err();
    assert_eq!(
        err.to_string(),
        "missing required endpoint parameter(s): api_endpoint, configuration"
    );
}

// --- producers and consumers ------------------------------------------------

#[test]
fn producer_without_factory_is_unsupported() {
    let err = endpoint().create_producer().err().expect("no producer");
    assert!(matches!(
        err,
        EndpointError::UnsupportedOperation { role: "producer", .. }
    ));
    assert_eq!(err.to_string(), "no producer for kv");
}

#[test]
fn consumer_without_factory_is_unsupported() {
    let sink: Arc<dyn MessageSink> = Arc::new(RecordingSink::default());
    let err = endpoint().create_consumer(sink).err().expect("no consumer");
    assert_eq!(err.to_string(), "no consumer for kv");
}

#[tokio::test]
async fn producer_factory_receives_endpoint_and_configuration() {
    let factory = RecordingProducerFactory::default();
    let endpoint = ConsulEndpoint::builder()
        .api_endpoint("kv")
        .configuration(offline_configuration())
        .producer_factory(factory.clone())
        .build()
        .expect("endpoint builds");

    let producer = endpoint.create_producer().expect("producer");
    let reply = producer.process(json!("ping")).await.expect("processes");
    assert_eq!(reply, json!({ "endpoint": "kv", "echo": "ping" }));

    let seen = factory.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(Arc::ptr_eq(&seen[0].0, &endpoint));
    assert_eq!(seen[0].1, offline_configuration());
}

#[test]
fn producer_factory_errors_propagate_unchanged() {
    let endpoint = ConsulEndpoint::builder()
        .api_endpoint("kv")
        .configuration(offline_configuration())
        .producer_fn(|_endpoint, _configuration| Err(Box::new(Boom) as BoxError))
        .build()
        .expect("endpoint builds");

    let err = endpoint.create_producer().err().expect("factory fails");
    assert_eq!(err.to_string(), "factory exploded");
    match err {
        EndpointError::Factory(inner) => assert!(inner.downcast_ref::<Boom>().is_some()),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn consumer_receives_sink_unmodified() {
    let endpoint = ConsulEndpoint::builder()
        .api_endpoint("kv")
        .configuration(offline_configuration())
        .consumer_factory(ForwardingConsumerFactory)
        .build()
        .expect("endpoint builds");

    let sink = Arc::new(RecordingSink::default());
    let consumer = endpoint
        .create_consumer(sink.clone())
        .expect("consumer");
    consumer.start().await.expect("starts");
    consumer.stop().await.expect("stops");

    let messages = sink.messages.lock().unwrap();
    assert_eq!(*messages, vec![json!({ "Key": "service/web", "Value": "on" })]);
}

#[test]
fn consumer_factory_errors_propagate_unchanged() {
    let endpoint = ConsulEndpoint::builder()
        .api_endpoint("kv")
        .configuration(offline_configuration())
        .consumer_fn(|_endpoint, _configuration, _sink| Err(Box::new(Boom) as BoxError))
        .build()
        .expect("endpoint builds");

    let sink: Arc<dyn MessageSink> = Arc::new(RecordingSink::default());
    let err = endpoint.create_consumer(sink).err().expect("factory fails");
    assert!(matches!(err, EndpointError::Factory(ref inner) if inner.is::<Boom>()));
}

// --- lazy client ------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_access_builds_once() {
    let (endpoint, counters) = counting_endpoint(0);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let endpoint = Arc::clone(&endpoint);
        handles.push(tokio::spawn(async move { endpoint.client().await }));
    }

    let mut clients = Vec::new();
    for handle in handles {
        clients.push(handle.await.expect("task joins").expect("client builds"));
    }

    assert_eq!(counters.builds.load(Ordering::SeqCst), 1);
    let first = &clients[0];
    assert!(clients.iter().all(|client| Arc::ptr_eq(client, first)));
}

#[tokio::test]
async fn repeated_access_reuses_client() {
    let (endpoint, counters) = counting_endpoint(0);

    let first = endpoint.client().await.expect("client builds");
    for _ in 0..5 {
        let again = endpoint.client().await.expect("client cached");
        assert!(Arc::ptr_eq(&first, &again));
    }

    assert_eq!(counters.builds.load(Ordering::SeqCst), 1);
    let cached = endpoint.cached_client().expect("slot populated");
    assert!(Arc::ptr_eq(&first, &cached));
    assert!(first.has_acl_token());
}

#[tokio::test]
async fn failed_construction_is_retried() {
    let (endpoint, counters) = counting_endpoint(1);

    let err = endpoint.client().await.unwrap_err();
    assert!(matches!(
        err,
        EndpointError::BackendConstruction(ClientError::Tls(_))
    ));
    assert!(endpoint.cached_client().is_none());

    let client = endpoint.client().await.expect("second attempt builds");
    assert_eq!(counters.builds.load(Ordering::SeqCst), 2);
    assert_eq!(counters.failures.load(Ordering::SeqCst), 0);
    assert_eq!(client.base_url(), "http://localhost:8500");
}

#[tokio::test]
async fn default_builder_applies_configuration() {
    let endpoint = ConsulEndpoint::builder()
        .api_endpoint("agent")
        .configuration(
            ConsulConfiguration::new()
                .with_url("http://consul.internal:8500/")
                .with_basic_auth("admin", "hunter2")
                .with_ping_instance(false),
        )
        .build()
        .expect("endpoint builds");

    let client = endpoint.client().await.expect("client builds offline");
    assert_eq!(client.base_url(), "http://consul.internal:8500");
    assert_eq!(client.basic_auth_user(), Some("admin"));
}

#[tokio::test]
async fn tls_failure_leaves_slot_empty() {
    let endpoint = ConsulEndpoint::builder()
        .api_endpoint("kv")
        .configuration(offline_configuration().with_ssl_context_parameters(
            SslContextParameters {
                ca_file: Some("/nonexistent/consul-ca.pem".into()),
                ..Default::default()
            },
        ))
        .build()
        .expect("endpoint builds");

    for _ in 0..2 {
        let err = endpoint.client().await.unwrap_err();
        assert!(matches!(
            err,
            EndpointError::BackendConstruction(ClientError::TlsMaterial { .. })
        ));
        assert!(endpoint.cached_client().is_none());
    }
}

#[tokio::test]
async fn unreachable_agent_surfaces_on_ping() {
    let endpoint = ConsulEndpoint::builder()
        .api_endpoint("kv")
        .configuration(
            ConsulConfiguration::new()
                .with_url("http://127.0.0.1:1")
                .with_connect_timeout_millis(500),
        )
        .build()
        .expect("endpoint builds");

    let err = endpoint.client().await.unwrap_err();
    assert!(matches!(
        err,
        EndpointError::BackendConstruction(ClientError::Http(_))
    ));
    assert!(endpoint.cached_client().is_none());
}
