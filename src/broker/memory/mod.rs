//! In-process broker
//!
//! A complete implementation of the broker capability that lives inside the
//! current process. It backs `memory://` URLs for local runs and gives tests
//! real redelivery behaviour without a network broker.
//!
//! # Example
//!
//! ```rust,no_run
//! use brokerlink::broker::memory::MemoryConnector;
//! use brokerlink::queue::{ClientConfig, ProducerConfig, QueueClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = MemoryConnector::new();
//! let mut config = ClientConfig::new("memory://local");
//! config.producers.push(ProducerConfig::new("orders"));
//!
//! let client = QueueClient::new(config, &connector).await?;
//! client.close().await;
//! # Ok(())
//! # }
//! ```

mod consumer;
mod producer;
mod state;

pub use consumer::MemoryConsumer;
pub use producer::MemoryProducer;
pub use state::MemoryBroker;

use crate::broker::error::{BrokerError, BrokerResult};
use crate::broker::traits::{BrokerClient, BrokerConnector, BrokerConsumer, BrokerProducer};
use crate::broker::types::{ConnectOptions, ConsumerOptions, ProducerOptions};
use crate::core::sync::handle_mutex_poison;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// URL scheme served by the in-process broker
pub const MEMORY_SCHEME: &str = "memory://";

/// Default time a delivery may stay unacknowledged before redelivery
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(1);

/// Connector for the in-process broker
///
/// Every connection made through the same connector shares one
/// [`MemoryBroker`], so several clients can produce to and share
/// subscriptions on the same topics.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    broker: Arc<MemoryBroker>,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::with_ack_timeout(DEFAULT_ACK_TIMEOUT)
    }

    pub fn with_ack_timeout(ack_timeout: Duration) -> Self {
        Self {
            broker: Arc::new(MemoryBroker::new(ack_timeout)),
        }
    }

    pub fn broker(&self) -> &Arc<MemoryBroker> {
        &self.broker
    }
}

#[async_trait]
impl BrokerConnector for MemoryConnector {
    async fn connect(&self, options: ConnectOptions) -> BrokerResult<Arc<dyn BrokerClient>> {
        if !options.url.starts_with(MEMORY_SCHEME) {
            return Err(BrokerError::Connection {
                message: format!(
                    "unsupported broker url '{}', expected {}<name>",
                    options.url, MEMORY_SCHEME
                ),
            });
        }
        log::debug!("memory broker: connected to {}", options.url);
        Ok(Arc::new(MemoryClient::new(Arc::clone(&self.broker))))
    }
}

/// One connection to the in-process broker
pub struct MemoryClient {
    broker: Arc<MemoryBroker>,
    closed: AtomicBool,
    producers: Mutex<Vec<Arc<MemoryProducer>>>,
    consumers: Mutex<Vec<Arc<MemoryConsumer>>>,
}

impl MemoryClient {
    fn new(broker: Arc<MemoryBroker>) -> Self {
        Self {
            broker,
            closed: AtomicBool::new(false),
            producers: Mutex::new(Vec::new()),
            consumers: Mutex::new(Vec::new()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> BrokerResult<()> {
        if self.is_closed() {
            Err(BrokerError::ClientClosed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BrokerClient for MemoryClient {
    async fn create_producer(
        &self,
        options: ProducerOptions,
    ) -> BrokerResult<Arc<dyn BrokerProducer>> {
        self.ensure_open()?;
        if options.topic.is_empty() {
            return Err(BrokerError::ProducerCreation {
                topic: options.topic,
                message: "topic must not be empty".to_string(),
            });
        }

        let producer = Arc::new(MemoryProducer::new(Arc::clone(&self.broker), options));
        handle_mutex_poison(self.producers.lock(), |message| {
            BrokerError::ProducerCreation {
                topic: producer.options().topic.clone(),
                message,
            }
        })?
        .push(Arc::clone(&producer));
        Ok(producer)
    }

    async fn subscribe(&self, options: ConsumerOptions) -> BrokerResult<Arc<dyn BrokerConsumer>> {
        self.ensure_open()?;
        let attachment = self.broker.attach(
            &options.topic,
            &options.subscription_name,
            options.subscription_type,
        )?;

        let consumer = Arc::new(MemoryConsumer::new(
            Arc::clone(&self.broker),
            options,
            attachment,
        ));
        handle_mutex_poison(self.consumers.lock(), |message| BrokerError::Subscribe {
            topic: String::new(),
            subscription: consumer.subscription().to_string(),
            message,
        })?
        .push(Arc::clone(&consumer));
        Ok(consumer)
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let producers = self
            .producers
            .lock()
            .map(|mut p| std::mem::take(&mut *p))
            .unwrap_or_default();
        for producer in producers {
            producer.close().await;
        }

        let consumers = self
            .consumers
            .lock()
            .map(|mut c| std::mem::take(&mut *c))
            .unwrap_or_default();
        for consumer in consumers {
            consumer.close().await;
        }

        log::debug!("memory broker: connection closed");
    }
}
