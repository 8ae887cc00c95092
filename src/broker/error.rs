//! Broker Error Types

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    #[error("Connection failed: {message}")]
    Connection { message: String },

    #[error("Operation timed out after {timeout_ms} ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Producer for topic [{topic}] could not be created: {message}")]
    ProducerCreation { topic: String, message: String },

    #[error("Subscription [{subscription}] on topic [{topic}] failed: {message}")]
    Subscribe {
        topic: String,
        subscription: String,
        message: String,
    },

    #[error("Send to topic [{topic}] failed: {message}")]
    Send { topic: String, message: String },

    #[error("Receive failed: {message}")]
    Receive { message: String },

    #[error("Acknowledge of message {message_id} failed: {message}")]
    Ack { message_id: String, message: String },

    #[error("Producer for topic [{topic}] is closed")]
    ProducerClosed { topic: String },

    #[error("Consumer [{consumer}] is closed")]
    ConsumerClosed { consumer: String },

    #[error("Client is closed")]
    ClientClosed,
}

impl BrokerError {
    /// True when the error comes from an intentional close rather than a
    /// transient failure; callers must stop using the handle.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            BrokerError::ProducerClosed { .. }
                | BrokerError::ConsumerClosed { .. }
                | BrokerError::ClientClosed
        )
    }
}

/// Result type for broker operations
pub type BrokerResult<T> = Result<T, BrokerError>;
