//! Queue client
//!
//! [`QueueClient`] owns one broker connection, the producers declared in the
//! configuration and every consumer registered through
//! [`QueueClient::new_consumer`]. It is shared by reference across tasks;
//! `produce` and `new_consumer` may be called concurrently.

use crate::broker::{
    BrokerClient, BrokerConnector, BrokerError, BrokerResult, ConsumerOptions, MessageId,
    SubscriptionType,
};
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::validation;
use crate::queue::config::{ClientConfig, DispatchConfig};
use crate::queue::consumer::{ConsumerEntry, ConsumerRegistry, Registration};
use crate::queue::converter;
use crate::queue::dispatch::{DispatchLoop, DispatchSnapshot, DispatchStats};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::handler::MessageHandler;
use crate::queue::identity;
use crate::queue::message::Message;
use crate::queue::publisher::{ProducerEntry, ProducerRegistry};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Client for one broker connection
///
/// # Example
///
/// ```rust,no_run
/// use brokerlink::broker::memory::MemoryConnector;
/// use brokerlink::queue::{handler_fn, ClientConfig, Message, ProducerConfig, QueueClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut config = ClientConfig::new("memory://local");
/// config.producers.push(ProducerConfig::new("orders"));
/// let client = QueueClient::new(config, &MemoryConnector::new()).await?;
///
/// client
///     .new_consumer("orders", "billing", handler_fn(|message: Message| async move {
///         println!("{}", message.payload_lossy());
///         Ok(())
///     }))
///     .await?;
///
/// client.produce("orders", Message::new("orders", b"order-1".to_vec())).await?;
/// client.close().await;
/// # Ok(())
/// # }
/// ```
pub struct QueueClient {
    url: String,
    operation_timeout: Duration,
    client: Arc<dyn BrokerClient>,
    producers: ProducerRegistry,
    consumers: ConsumerRegistry,
    dispatch: DispatchConfig,
    shutdown: ShutdownCoordinator,
    closed: bool,
}

impl QueueClient {
    /// Connect to the broker and create one producer per configured topic
    ///
    /// Connection and producer failures are fatal: producers created so far
    /// and the connection are closed before the error is returned.
    pub async fn new(config: ClientConfig, connector: &dyn BrokerConnector) -> QueueResult<Self> {
        config.validate()?;
        let operation_timeout = config.operation_timeout();

        log::info!(
            "connecting to broker {} ({} producers)",
            config.url,
            config.producers.len()
        );
        let client = with_timeout(
            "connect",
            operation_timeout,
            connector.connect(config.connect_options()),
        )
        .await
        .map_err(|source| {
            log::error!("create broker client failed: {}", source);
            QueueError::Connection {
                url: config.url.clone(),
                source,
            }
        })?;

        let mut producers = ProducerRegistry::default();
        for producer_config in &config.producers {
            let options = config.producer_options(producer_config);
            let created = with_timeout(
                "create producer",
                operation_timeout,
                client.create_producer(options.clone()),
            )
            .await;

            match created {
                Ok(producer) => {
                    log::debug!(
                        "producer for topic {} created (batching {} ms, {} messages, {} bytes)",
                        options.topic,
                        options.batching_max_publish_delay.as_millis(),
                        options.batching_max_messages,
                        options.batching_max_size_bytes
                    );
                    producers.insert(ProducerEntry {
                        topic: options.topic.clone(),
                        producer,
                        options,
                    });
                }
                Err(source) => {
                    log::error!(
                        "create producer for topic {} failed: {}",
                        producer_config.topic,
                        source
                    );
                    producers.close_all().await;
                    client.close().await;
                    return Err(QueueError::ProducerCreation {
                        topic: producer_config.topic.clone(),
                        source,
                    });
                }
            }
        }

        let (shutdown, _) = ShutdownCoordinator::new();
        log::info!(
            "broker client ready: {} producers",
            producers.len()
        );

        Ok(Self {
            url: config.url,
            operation_timeout,
            client,
            producers,
            consumers: ConsumerRegistry::default(),
            dispatch: config.dispatch,
            shutdown,
            closed: false,
        })
    }

    /// Send a message through the producer registered for `topic`
    ///
    /// The message's own `topic` field is ignored; routing uses `topic`.
    /// Unknown topics fail without any broker call.
    pub async fn produce(&self, topic: &str, message: Message) -> QueueResult<MessageId> {
        validation::require_payload(&message.payload).map_err(QueueError::invalid_argument)?;

        let entry = self
            .producers
            .get(topic)
            .ok_or_else(|| QueueError::ProducerNotFound {
                topic: topic.to_string(),
            })?;

        log::debug!(
            "produce message to topic {}: '{}'",
            topic,
            message.payload_lossy()
        );

        let send = entry.producer.send(converter::to_outbound(&message));
        let send_timeout = entry.options.send_timeout;
        let sent = if send_timeout.is_zero() {
            send.await
        } else {
            match tokio::time::timeout(send_timeout, send).await {
                Ok(sent) => sent,
                Err(_) => {
                    return Err(QueueError::SendTimeout {
                        topic: topic.to_string(),
                        timeout_ms: send_timeout.as_millis() as u64,
                    })
                }
            }
        };

        sent.map_err(|source| QueueError::Send {
            topic: topic.to_string(),
            source,
        })
    }

    /// Send a message to the topic named in the message itself
    pub async fn produce_message(&self, message: Message) -> QueueResult<MessageId> {
        let topic = message.topic.clone();
        self.produce(&topic, message).await
    }

    /// Subscribe `group` to `topic` and start dispatching to `handler`
    ///
    /// Only one consumer may exist per topic, regardless of group. The
    /// subscription is shared, so other processes using the same group
    /// split the topic's messages with this one.
    pub async fn new_consumer<H>(&self, topic: &str, group: &str, handler: H) -> QueueResult<()>
    where
        H: MessageHandler,
    {
        validation::require_non_empty(topic, "topic").map_err(QueueError::invalid_argument)?;
        validation::require_non_empty(group, "group").map_err(QueueError::invalid_argument)?;

        let mut consumers = self.consumers.lock().await;
        if let Some(existing) = consumers.get(topic) {
            log::warn!(
                "consumer for topic {} already registered by group {}",
                topic,
                existing.group
            );
            return Err(QueueError::ConsumerAlreadyExists {
                topic: topic.to_string(),
                group: group.to_string(),
            });
        }

        let name = identity::consumer_name(topic, group);
        let consumer = with_timeout(
            "subscribe",
            self.operation_timeout,
            self.client.subscribe(ConsumerOptions {
                topic: topic.to_string(),
                subscription_name: group.to_string(),
                subscription_type: SubscriptionType::Shared,
                name: name.clone(),
            }),
        )
        .await
        .map_err(|source| {
            log::error!(
                "create consumer for group {} topic {} failed: {}",
                group,
                topic,
                source
            );
            QueueError::Subscribe {
                topic: topic.to_string(),
                group: group.to_string(),
                source,
            }
        })?;

        let stats = Arc::new(DispatchStats::default());
        let mut registration = Registration::new(
            &mut consumers,
            ConsumerEntry {
                topic: topic.to_string(),
                group: group.to_string(),
                name: name.clone(),
                consumer: Arc::clone(&consumer),
                stats: Arc::clone(&stats),
                task: None,
            },
        );

        let task = DispatchLoop::new(
            topic.to_string(),
            consumer,
            Arc::new(handler),
            self.dispatch.clone(),
            stats,
            self.shutdown.subscribe(),
            self.shutdown.requested_flag(),
        )
        .spawn();
        registration.attach_task(task);

        log::info!(
            "consumer {} subscribed to topic {} as group {}",
            name,
            topic,
            group
        );
        Ok(())
    }

    /// Flush and close every producer, stop every consumer, then disconnect
    ///
    /// Errors are logged and never stop the sequence. In-flight handlers
    /// finish and are acknowledged before their consumer is closed.
    pub async fn close(mut self) {
        self.close_inner().await;
    }

    async fn close_inner(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        log::info!("closing broker client for {}", self.url);

        self.producers.close_all().await;

        self.shutdown.trigger_shutdown();
        for mut entry in self.consumers.drain().await {
            if let Some(task) = entry.task.take() {
                if let Err(e) = task.await {
                    log::error!(
                        "dispatch loop for consumer {} ended abnormally: {}",
                        entry.name,
                        e
                    );
                }
            }
            entry.consumer.close().await;
            log::debug!("consumer {} closed", entry.name);
        }

        self.client.close().await;
        log::info!("broker client closed");
    }

    /// Broker URL this client is connected to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Topics with a registered producer, sorted
    pub fn producer_topics(&self) -> Vec<String> {
        self.producers.topics()
    }

    /// Topics with a registered consumer, sorted
    pub async fn consumer_topics(&self) -> Vec<String> {
        self.consumers.topics().await
    }

    /// Broker-visible name of the consumer registered for `topic`
    pub async fn consumer_name(&self, topic: &str) -> Option<String> {
        self.consumers.name(topic).await
    }

    /// Dispatch counters for the consumer registered for `topic`
    pub async fn consumer_stats(&self, topic: &str) -> Option<DispatchSnapshot> {
        self.consumers.stats(topic).await
    }
}

impl Drop for QueueClient {
    fn drop(&mut self) {
        if !self.closed {
            log::warn!(
                "broker client for {} dropped without close; stopping dispatch loops",
                self.url
            );
            self.shutdown.trigger_shutdown();
        }
    }
}

async fn with_timeout<T, F>(operation: &str, timeout: Duration, future: F) -> BrokerResult<T>
where
    F: Future<Output = BrokerResult<T>>,
{
    if timeout.is_zero() {
        return future.await;
    }
    tokio::time::timeout(timeout, future)
        .await
        .unwrap_or_else(|_| {
            Err(BrokerError::Timeout {
                operation: operation.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        })
}
