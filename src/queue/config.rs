//! Queue client configuration
//!
//! Loaded from TOML (see `app::cli::config`) with the `[[producers]]` and
//! `[dispatch]` tables; every field except `url` and the producer topics has a
//! default.

use crate::broker::{CompressionType, ConnectOptions, ProducerOptions};
use crate::core::retry::RetryPolicy;
use crate::core::validation::require_non_empty;
use crate::queue::error::{QueueError, QueueResult};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

/// Fixed timeout for broker operations (connect, subscribe)
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 10_000;
/// Deliveries beyond this count are dropped as poison messages
pub const DEFAULT_MAX_REDELIVERIES: u32 = 3;
pub const DEFAULT_RECEIVE_RETRY_DELAY_MS: u64 = 500;
pub const DEFAULT_RECEIVE_RETRY_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub url: String,
    pub operation_timeout_ms: u64,
    pub send_timeout_ms: u64,
    pub compression: CompressionType,
    pub producers: Vec<ProducerConfig>,
    pub dispatch: DispatchConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
            compression: CompressionType::default(),
            producers: Vec::new(),
            dispatch: DispatchConfig::default(),
        }
    }
}

/// One eagerly created producer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProducerConfig {
    pub topic: String,
    /// Milliseconds a partial batch may wait before it is published
    #[serde(default = "default_batching_delay")]
    pub batching_max_publish_delay: u64,
    #[serde(default = "default_batching_messages")]
    pub batching_max_messages: u32,
    /// Kilobytes; converted to bytes when the producer is created
    #[serde(default = "default_batching_size")]
    pub batching_max_size: u32,
}

fn default_batching_delay() -> u64 {
    10
}

fn default_batching_messages() -> u32 {
    1000
}

fn default_batching_size() -> u32 {
    128
}

impl ProducerConfig {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            batching_max_publish_delay: default_batching_delay(),
            batching_max_messages: default_batching_messages(),
            batching_max_size: default_batching_size(),
        }
    }

    pub fn batching_max_size_bytes(&self) -> u32 {
        self.batching_max_size.saturating_mul(1024)
    }
}

/// Behaviour of the per-consumer dispatch loop
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Messages redelivered more often than this are acknowledged and dropped
    pub max_redeliveries: u32,
    pub receive_retry_delay_ms: u64,
    pub receive_retry_attempts: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_redeliveries: DEFAULT_MAX_REDELIVERIES,
            receive_retry_delay_ms: DEFAULT_RECEIVE_RETRY_DELAY_MS,
            receive_retry_attempts: DEFAULT_RECEIVE_RETRY_ATTEMPTS,
        }
    }
}

impl DispatchConfig {
    pub fn receive_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.receive_retry_attempts.max(1),
            delay: Duration::from_millis(self.receive_retry_delay_ms),
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(contents: &str) -> QueueResult<Self> {
        let config: Self = toml::from_str(contents).map_err(|e| QueueError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> QueueResult<()> {
        if self.url.trim().is_empty() {
            return Err(QueueError::Config {
                message: "broker url must be set".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for producer in &self.producers {
            require_non_empty(&producer.topic, "producer topic")
                .map_err(|message| QueueError::Config { message })?;
            if !seen.insert(producer.topic.as_str()) {
                return Err(QueueError::Config {
                    message: format!("producer for topic [{}] configured twice", producer.topic),
                });
            }
        }
        Ok(())
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            url: self.url.clone(),
            operation_timeout: self.operation_timeout(),
        }
    }

    pub fn producer_options(&self, producer: &ProducerConfig) -> ProducerOptions {
        ProducerOptions {
            topic: producer.topic.clone(),
            name: None,
            send_timeout: self.send_timeout(),
            compression: self.compression,
            batching_max_publish_delay: Duration::from_millis(producer.batching_max_publish_delay),
            batching_max_messages: producer.batching_max_messages,
            batching_max_size_bytes: producer.batching_max_size_bytes(),
        }
    }
}
