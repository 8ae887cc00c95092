//! Native broker-side types
//!
//! These structures describe messages and options exactly as the broker
//! capability sees them. Application code works with
//! [`crate::queue::Message`] instead; the converter maps between the two.

use serde::Deserialize;
use std::fmt;
use std::time::{Duration, SystemTime};
use strum_macros::{Display, EnumString};

/// Opaque identifier the broker uses to track a delivery
///
/// Acknowledgement is always keyed by this identifier, never by the
/// converted application message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId {
    entry_id: u64,
}

impl MessageId {
    pub fn new(entry_id: u64) -> Self {
        Self { entry_id }
    }

    pub fn entry_id(&self) -> u64 {
        self.entry_id
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.entry_id)
    }
}

/// A message as delivered by the broker to a consumer
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerMessage {
    pub id: MessageId,
    pub topic: String,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    /// Number of previous delivery attempts that were not acknowledged
    pub redelivery_count: u32,
    pub publish_time: SystemTime,
}

impl BrokerMessage {
    /// Payload rendered for log lines (lossy UTF-8)
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// A message handed to a producer for sending
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutboundMessage {
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

/// Payload compression applied by producers
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CompressionType {
    None,
    Lz4,
    Zlib,
    #[default]
    Zstd,
    Snappy,
}

/// How a subscription spreads messages over its consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SubscriptionType {
    /// A single consumer owns the subscription
    Exclusive,
    /// Consumers share the subscription; each message goes to one of them
    Shared,
}

/// Parameters for establishing the broker connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub url: String,
    pub operation_timeout: Duration,
}

/// Static producer configuration, fixed at creation time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerOptions {
    pub topic: String,
    /// Producer name; `None` lets the broker assign one
    pub name: Option<String>,
    pub send_timeout: Duration,
    pub compression: CompressionType,
    pub batching_max_publish_delay: Duration,
    pub batching_max_messages: u32,
    pub batching_max_size_bytes: u32,
}

/// Subscription parameters for a consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerOptions {
    pub topic: String,
    pub subscription_name: String,
    pub subscription_type: SubscriptionType,
    /// Consumer name, used for broker-side diagnostics only
    pub name: String,
}
