//! Broker Client Capability
//!
//! The queue client only ever talks to a broker through these traits. A
//! concrete backend (the in-process [`crate::broker::memory`] broker, or a
//! network client) implements them; the queue layer adds registration,
//! dispatch and shutdown on top.
//!
//! Transport-level retry is not expected from implementations. Errors are
//! reported as-is and the caller decides whether to retry.

use crate::broker::error::BrokerResult;
use crate::broker::types::{
    BrokerMessage, ConnectOptions, ConsumerOptions, MessageId, OutboundMessage, ProducerOptions,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Establishes broker connections
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect(&self, options: ConnectOptions) -> BrokerResult<Arc<dyn BrokerClient>>;
}

/// A live broker connection
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn create_producer(&self, options: ProducerOptions)
        -> BrokerResult<Arc<dyn BrokerProducer>>;

    async fn subscribe(&self, options: ConsumerOptions) -> BrokerResult<Arc<dyn BrokerConsumer>>;

    /// Close the connection. Never fails; handles created from this
    /// connection must report closed errors afterwards.
    async fn close(&self);
}

/// Sends messages to one topic
#[async_trait]
pub trait BrokerProducer: Send + Sync {
    fn topic(&self) -> &str;

    async fn send(&self, message: OutboundMessage) -> BrokerResult<MessageId>;

    /// Push out any messages still held in a pending batch
    async fn flush(&self) -> BrokerResult<()>;

    async fn close(&self);
}

/// Receives messages from one subscription
#[async_trait]
pub trait BrokerConsumer: Send + Sync {
    fn name(&self) -> &str;

    /// Block until a message arrives or the consumer is closed
    async fn receive(&self) -> BrokerResult<BrokerMessage>;

    async fn ack(&self, id: MessageId) -> BrokerResult<()>;

    /// Close the consumer; a pending or later `receive` fails with a
    /// closed error.
    async fn close(&self);
}
