//! Common test utilities and helpers
//!
//! [`RecordingConnector`] wraps the in-process broker and appends every
//! broker call to a shared log, so integration tests get real delivery
//! behaviour and can still assert on call order.

#![allow(dead_code)]

use async_trait::async_trait;
use brokerlink::broker::memory::MemoryConnector;
use brokerlink::broker::{
    BrokerClient, BrokerConnector, BrokerConsumer, BrokerMessage, BrokerProducer, BrokerResult,
    ConnectOptions, ConsumerOptions, MessageId, OutboundMessage, ProducerOptions,
};
use brokerlink::queue::{HandlerError, Message, MessageHandler};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub type CallLog = Arc<Mutex<Vec<String>>>;

#[derive(Clone)]
pub struct RecordingConnector {
    inner: MemoryConnector,
    calls: CallLog,
}

impl RecordingConnector {
    pub fn new(inner: MemoryConnector) -> Self {
        Self {
            inner,
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn memory(&self) -> &MemoryConnector {
        &self.inner
    }
}

fn record(calls: &CallLog, call: String) {
    calls.lock().unwrap().push(call);
}

#[async_trait]
impl BrokerConnector for RecordingConnector {
    async fn connect(&self, options: ConnectOptions) -> BrokerResult<Arc<dyn BrokerClient>> {
        record(&self.calls, format!("connect:{}", options.url));
        let inner = self.inner.connect(options).await?;
        Ok(Arc::new(RecordingClient {
            inner,
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct RecordingClient {
    inner: Arc<dyn BrokerClient>,
    calls: CallLog,
}

#[async_trait]
impl BrokerClient for RecordingClient {
    async fn create_producer(
        &self,
        options: ProducerOptions,
    ) -> BrokerResult<Arc<dyn BrokerProducer>> {
        record(&self.calls, format!("create_producer:{}", options.topic));
        let inner = self.inner.create_producer(options).await?;
        Ok(Arc::new(RecordingProducer {
            inner,
            calls: Arc::clone(&self.calls),
        }))
    }

    async fn subscribe(&self, options: ConsumerOptions) -> BrokerResult<Arc<dyn BrokerConsumer>> {
        record(
            &self.calls,
            format!("subscribe:{}:{}:{}", options.topic, options.subscription_name, options.subscription_type),
        );
        let topic = options.topic.clone();
        let inner = self.inner.subscribe(options).await?;
        Ok(Arc::new(RecordingConsumer {
            inner,
            topic,
            calls: Arc::clone(&self.calls),
        }))
    }

    async fn close(&self) {
        record(&self.calls, "close_client".to_string());
        self.inner.close().await;
    }
}

struct RecordingProducer {
    inner: Arc<dyn BrokerProducer>,
    calls: CallLog,
}

#[async_trait]
impl BrokerProducer for RecordingProducer {
    fn topic(&self) -> &str {
        self.inner.topic()
    }

    async fn send(&self, message: OutboundMessage) -> BrokerResult<MessageId> {
        record(&self.calls, format!("send:{}", self.topic()));
        self.inner.send(message).await
    }

    async fn flush(&self) -> BrokerResult<()> {
        record(&self.calls, format!("flush:{}", self.topic()));
        self.inner.flush().await
    }

    async fn close(&self) {
        record(&self.calls, format!("close_producer:{}", self.topic()));
        self.inner.close().await;
    }
}

struct RecordingConsumer {
    inner: Arc<dyn BrokerConsumer>,
    topic: String,
    calls: CallLog,
}

#[async_trait]
impl BrokerConsumer for RecordingConsumer {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn receive(&self) -> BrokerResult<BrokerMessage> {
        self.inner.receive().await
    }

    async fn ack(&self, id: MessageId) -> BrokerResult<()> {
        record(&self.calls, format!("ack:{}", self.topic));
        self.inner.ack(id).await
    }

    async fn close(&self) {
        record(&self.calls, format!("close_consumer:{}", self.topic));
        self.inner.close().await;
    }
}

/// Handler collecting payloads; fails on payloads starting with `fail`
#[derive(Clone, Default)]
pub struct CollectingHandler {
    pub payloads: Arc<Mutex<Vec<String>>>,
}

impl CollectingHandler {
    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageHandler for CollectingHandler {
    async fn handle(&self, message: Message) -> Result<(), HandlerError> {
        let payload = message.payload_lossy();
        self.payloads.lock().unwrap().push(payload.clone());
        if payload.starts_with("fail") {
            return Err(HandlerError::new(format!("cannot process {}", payload)));
        }
        Ok(())
    }
}

/// Poll `condition` until it holds or two seconds pass
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
