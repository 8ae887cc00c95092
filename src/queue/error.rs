//! Queue Error Types

use crate::broker::BrokerError;
use crate::core::error_handling::ContextualError;

/// Coarse classification of queue errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller passed an empty topic, group or payload
    InvalidArgument,
    /// No producer registered for the topic
    NotFound,
    /// A consumer is already registered for the topic
    AlreadyExists,
    /// Startup cannot continue (connection or producer provisioning failed)
    Fatal,
    /// Broker call failed; retrying later may succeed
    Transient,
    /// Configuration is invalid
    Config,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("producer for topic [{topic}] not registered")]
    ProducerNotFound { topic: String },

    #[error("consumer for group [{group}] topic [{topic}] already exists")]
    ConsumerAlreadyExists { topic: String, group: String },

    #[error("create broker client for {url} failed: {source}")]
    Connection {
        url: String,
        #[source]
        source: BrokerError,
    },

    #[error("create producer for topic [{topic}] failed: {source}")]
    ProducerCreation {
        topic: String,
        #[source]
        source: BrokerError,
    },

    #[error("create consumer for group [{group}] topic [{topic}] failed: {source}")]
    Subscribe {
        topic: String,
        group: String,
        #[source]
        source: BrokerError,
    },

    #[error("send to topic [{topic}] failed: {source}")]
    Send {
        topic: String,
        #[source]
        source: BrokerError,
    },

    #[error("send to topic [{topic}] timed out after {timeout_ms} ms")]
    SendTimeout { topic: String, timeout_ms: u64 },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl QueueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueueError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            QueueError::ProducerNotFound { .. } => ErrorKind::NotFound,
            QueueError::ConsumerAlreadyExists { .. } => ErrorKind::AlreadyExists,
            QueueError::Connection { .. } | QueueError::ProducerCreation { .. } => {
                ErrorKind::Fatal
            }
            QueueError::Subscribe { .. }
            | QueueError::Send { .. }
            | QueueError::SendTimeout { .. } => ErrorKind::Transient,
            QueueError::Config { .. } => ErrorKind::Config,
        }
    }

    /// True when the client cannot be used and the process should stop
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        QueueError::InvalidArgument {
            message: message.into(),
        }
    }
}

impl ContextualError for QueueError {
    fn is_user_actionable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidArgument
                | ErrorKind::NotFound
                | ErrorKind::AlreadyExists
                | ErrorKind::Config
        )
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            QueueError::InvalidArgument { message } | QueueError::Config { message } => {
                Some(message)
            }
            QueueError::ProducerNotFound { .. } => {
                Some("producer for topic not registered; add it to the producer configuration")
            }
            QueueError::ConsumerAlreadyExists { .. } => {
                Some("a consumer is already registered for this topic")
            }
            _ => None,
        }
    }
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
