//! Consumer message handlers
//!
//! A handler is called once per delivered, non-poison message. Returning an
//! error leaves the message unacknowledged so the broker redelivers it.

use crate::queue::message::Message;
use async_trait::async_trait;
use std::future::Future;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    #[error("{message}")]
    Failed { message: String },

    #[error("handler panicked: {message}")]
    Panicked { message: String },
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        HandlerError::Failed {
            message: message.into(),
        }
    }
}

/// Processes messages delivered to a consumer
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use brokerlink::queue::{HandlerError, Message, MessageHandler};
///
/// struct PrintHandler;
///
/// #[async_trait]
/// impl MessageHandler for PrintHandler {
///     async fn handle(&self, message: Message) -> Result<(), HandlerError> {
///         println!("{}: {}", message.topic, message.payload_lossy());
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, message: Message) -> Result<(), HandlerError>;
}

/// Adapter turning an async closure into a [`MessageHandler`]
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, message: Message) -> Result<(), HandlerError> {
        (self.f)(message).await
    }
}

/// Build a handler from an async closure
///
/// ```rust
/// use brokerlink::queue::{handler_fn, Message};
///
/// let handler = handler_fn(|message: Message| async move {
///     log::info!("got {} bytes", message.payload.len());
///     Ok(())
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    FnHandler { f }
}
