//! Scriptable broker used by the queue tests
//!
//! Every broker call is appended to a shared call log so tests can assert on
//! ordering. Messages are fed to subscriptions by hand through
//! [`FakeBroker::deliver`].

use crate::broker::{
    BrokerClient, BrokerConnector, BrokerConsumer, BrokerError, BrokerMessage, BrokerProducer,
    BrokerResult, ConnectOptions, ConsumerOptions, MessageId, OutboundMessage, ProducerOptions,
};
use crate::queue::{HandlerError, Message, MessageHandler};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{mpsc, Notify};

type Feed = mpsc::UnboundedSender<BrokerResult<BrokerMessage>>;

/// Failure switches for the fake broker
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeBehaviour {
    pub fail_connect: bool,
    pub connect_delay: Option<Duration>,
    pub fail_producer_topics: Vec<String>,
    pub fail_flush_topics: Vec<String>,
    pub fail_subscribe: bool,
    pub subscribe_delay: Option<Duration>,
    pub fail_ack: bool,
    pub send_delay: Option<Duration>,
}

#[derive(Default)]
struct Shared {
    behaviour: FakeBehaviour,
    calls: Mutex<Vec<String>>,
    sent: Mutex<Vec<(String, OutboundMessage)>>,
    acks: Mutex<Vec<MessageId>>,
    feeds: Mutex<HashMap<String, Feed>>,
    next_id: AtomicU64,
}

impl Shared {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn next_id(&self) -> MessageId {
        MessageId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[derive(Clone, Default)]
pub(crate) struct FakeBroker {
    shared: Arc<Shared>,
}

impl FakeBroker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(behaviour: FakeBehaviour) -> Self {
        Self {
            shared: Arc::new(Shared {
                behaviour,
                ..Shared::default()
            }),
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.shared.calls.lock().unwrap().clone()
    }

    /// Calls starting with `prefix`
    pub(crate) fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub(crate) fn sent(&self) -> Vec<(String, OutboundMessage)> {
        self.shared.sent.lock().unwrap().clone()
    }

    pub(crate) fn acked(&self) -> Vec<MessageId> {
        self.shared.acks.lock().unwrap().clone()
    }

    /// Push a message to the subscription on `topic`
    pub(crate) fn deliver(&self, topic: &str, payload: &str, redelivery_count: u32) -> MessageId {
        let id = self.shared.next_id();
        self.feed(
            topic,
            Ok(BrokerMessage {
                id,
                topic: topic.to_string(),
                key: None,
                payload: payload.as_bytes().to_vec(),
                redelivery_count,
                publish_time: SystemTime::now(),
            }),
        );
        id
    }

    /// Make the next receive on `topic` fail with `error`
    pub(crate) fn fail_receive(&self, topic: &str, error: BrokerError) {
        self.feed(topic, Err(error));
    }

    fn feed(&self, topic: &str, item: BrokerResult<BrokerMessage>) {
        let feeds = self.shared.feeds.lock().unwrap();
        let feed = feeds
            .get(topic)
            .unwrap_or_else(|| panic!("no subscription on {}", topic));
        // a stopped consumer drops its receiver; late deliveries are discarded
        let _ = feed.send(item);
    }
}

#[async_trait]
impl BrokerConnector for FakeBroker {
    async fn connect(&self, options: ConnectOptions) -> BrokerResult<Arc<dyn BrokerClient>> {
        self.shared.record("connect");
        if let Some(delay) = self.shared.behaviour.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if self.shared.behaviour.fail_connect {
            return Err(BrokerError::Connection {
                message: format!("{} unreachable", options.url),
            });
        }
        Ok(Arc::new(FakeClient {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct FakeClient {
    shared: Arc<Shared>,
}

#[async_trait]
impl BrokerClient for FakeClient {
    async fn create_producer(
        &self,
        options: ProducerOptions,
    ) -> BrokerResult<Arc<dyn BrokerProducer>> {
        self.shared
            .record(format!("create_producer:{}", options.topic));
        if self
            .shared
            .behaviour
            .fail_producer_topics
            .contains(&options.topic)
        {
            return Err(BrokerError::ProducerCreation {
                topic: options.topic,
                message: "topic fenced".to_string(),
            });
        }
        Ok(Arc::new(FakeProducer {
            shared: Arc::clone(&self.shared),
            topic: options.topic,
        }))
    }

    async fn subscribe(&self, options: ConsumerOptions) -> BrokerResult<Arc<dyn BrokerConsumer>> {
        self.shared.record(format!(
            "subscribe:{}:{}",
            options.topic, options.subscription_name
        ));
        if let Some(delay) = self.shared.behaviour.subscribe_delay {
            tokio::time::sleep(delay).await;
        }
        if self.shared.behaviour.fail_subscribe {
            return Err(BrokerError::Subscribe {
                topic: options.topic,
                subscription: options.subscription_name,
                message: "subscription quota exceeded".to_string(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.shared
            .feeds
            .lock()
            .unwrap()
            .insert(options.topic.clone(), tx);
        Ok(Arc::new(FakeConsumer {
            shared: Arc::clone(&self.shared),
            topic: options.topic,
            name: options.name,
            rx: tokio::sync::Mutex::new(rx),
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
        }))
    }

    async fn close(&self) {
        self.shared.record("close_client");
    }
}

struct FakeProducer {
    shared: Arc<Shared>,
    topic: String,
}

#[async_trait]
impl BrokerProducer for FakeProducer {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn send(&self, message: OutboundMessage) -> BrokerResult<MessageId> {
        self.shared.record(format!("send:{}", self.topic));
        if let Some(delay) = self.shared.behaviour.send_delay {
            tokio::time::sleep(delay).await;
        }
        self.shared
            .sent
            .lock()
            .unwrap()
            .push((self.topic.clone(), message));
        Ok(self.shared.next_id())
    }

    async fn flush(&self) -> BrokerResult<()> {
        self.shared.record(format!("flush:{}", self.topic));
        if self.shared.behaviour.fail_flush_topics.contains(&self.topic) {
            return Err(BrokerError::Send {
                topic: self.topic.clone(),
                message: "flush rejected".to_string(),
            });
        }
        Ok(())
    }

    async fn close(&self) {
        self.shared.record(format!("close_producer:{}", self.topic));
    }
}

struct FakeConsumer {
    shared: Arc<Shared>,
    topic: String,
    name: String,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<BrokerResult<BrokerMessage>>>,
    closed: AtomicBool,
    close_notify: Notify,
}

impl FakeConsumer {
    fn closed_error(&self) -> BrokerError {
        BrokerError::ConsumerClosed {
            consumer: self.name.clone(),
        }
    }
}

#[async_trait]
impl BrokerConsumer for FakeConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive(&self) -> BrokerResult<BrokerMessage> {
        if self.closed.load(Ordering::Acquire) {
            return Err(self.closed_error());
        }
        let mut rx = self.rx.lock().await;
        tokio::select! {
            _ = self.close_notify.notified() => Err(self.closed_error()),
            item = rx.recv() => item.unwrap_or_else(|| Err(self.closed_error())),
        }
    }

    async fn ack(&self, id: MessageId) -> BrokerResult<()> {
        self.shared
            .record(format!("ack:{}:{}", self.topic, id.entry_id()));
        if self.shared.behaviour.fail_ack {
            return Err(BrokerError::Ack {
                message_id: id.to_string(),
                message: "ack rejected".to_string(),
            });
        }
        self.shared.acks.lock().unwrap().push(id);
        Ok(())
    }

    async fn close(&self) {
        self.shared.record(format!("close_consumer:{}", self.topic));
        self.closed.store(true, Ordering::Release);
        self.close_notify.notify_one();
    }
}

/// Handler that records payloads and fails or panics on request
///
/// Payload `fail` returns an error, `panic` panics, `slow` sleeps before
/// succeeding; anything else succeeds.
#[derive(Clone, Default)]
pub(crate) struct RecordingHandler {
    pub seen: Arc<Mutex<Vec<Message>>>,
    pub started: Arc<AtomicUsize>,
    pub finished: Arc<AtomicUsize>,
}

impl RecordingHandler {
    pub(crate) fn payloads(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.payload_lossy())
            .collect()
    }

    pub(crate) fn calls(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(&self, message: Message) -> Result<(), HandlerError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let payload = message.payload_lossy();
        self.seen.lock().unwrap().push(message);

        let result = match payload.as_str() {
            "fail" => Err(HandlerError::new("rejected by handler")),
            "panic" => panic!("handler blew up"),
            "slow" => {
                tokio::time::sleep(Duration::from_millis(150)).await;
                Ok(())
            }
            _ => Ok(()),
        };
        self.finished.fetch_add(1, Ordering::SeqCst);
        result
    }
}

/// Poll `condition` until it holds or two seconds pass
pub(crate) async fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
