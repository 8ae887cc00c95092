//! Application message type
//!
//! [`Message`] is what application code produces and what consumer handlers
//! receive. It is independent of any broker's native representation; the
//! [`crate::queue::converter`] module maps between the two.

use crate::broker::MessageId;

/// Application-visible unit of the queue
///
/// # Example
///
/// ```rust
/// use brokerlink::queue::Message;
///
/// let message = Message::new("orders", b"order-42".to_vec()).with_key("customer-7");
/// assert_eq!(message.key.as_deref(), Some("customer-7"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub topic: String,
    /// Routing key; `None` when the producer did not set one
    pub key: Option<String>,
    pub payload: Vec<u8>,
    /// Previous delivery attempts; set on inbound messages only
    pub redelivery_count: u32,
    /// Broker identifier of the delivery; set on inbound messages only
    pub message_id: Option<MessageId>,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            payload,
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Payload rendered for log lines (lossy UTF-8)
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
