//! Broker Client Capability
//!
//! The capability the queue client is built on: connect, create producers,
//! subscribe consumers, send, receive, acknowledge and close. Backends
//! implement the traits in [`traits`]; [`memory`] is the in-process backend.

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{BrokerError, BrokerResult};
pub use traits::{BrokerClient, BrokerConnector, BrokerConsumer, BrokerProducer};
pub use types::{
    BrokerMessage, CompressionType, ConnectOptions, ConsumerOptions, MessageId, OutboundMessage,
    ProducerOptions, SubscriptionType,
};
