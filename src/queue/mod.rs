//! Broker-backed message queue client
//!
//! A thin layer over a message broker connection that gives applications a
//! small, safe surface:
//!
//! - **Producers** are created eagerly, one per configured topic, when the
//!   client is built. Sending to a topic without a producer is an error.
//! - **Consumers** are registered at runtime, at most one per topic. Each
//!   subscription is shared, so several processes with the same group split
//!   a topic's messages between them.
//! - **Dispatch** runs one background loop per consumer. A handler success
//!   acknowledges the message; a failure leaves it for redelivery; a message
//!   redelivered more than `max_redeliveries` times is acknowledged and
//!   dropped without reaching the handler.
//!
//! # Architecture
//!
//! ```text
//!   produce(topic, msg)                 new_consumer(topic, group, handler)
//!          │                                        │
//!          ▼                                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        QueueClient                          │
//! │  ProducerRegistry (read-only)    ConsumerRegistry (locked)  │
//! │          │                           │         │            │
//! │          │                           │    DispatchLoop ──▶ handler
//! └──────────┼───────────────────────────┼─────────┼────────────┘
//!            ▼                           ▼         │ receive / ack
//! ┌─────────────────────────────────────────────────────────────┐
//! │              BrokerClient (connection capability)           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use brokerlink::broker::memory::MemoryConnector;
//! use brokerlink::queue::{handler_fn, ClientConfig, HandlerError, Message, ProducerConfig, QueueClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = ClientConfig::new("memory://local");
//! config.producers.push(ProducerConfig::new("orders"));
//! config.producers.push(ProducerConfig::new("invoices"));
//!
//! let client = QueueClient::new(config, &MemoryConnector::new()).await?;
//!
//! client
//!     .new_consumer("orders", "billing", handler_fn(|message: Message| async move {
//!         if message.payload.is_empty() {
//!             return Err(HandlerError::new("empty order"));
//!         }
//!         Ok(())
//!     }))
//!     .await?;
//!
//! client.produce("orders", Message::new("orders", b"order-1".to_vec())).await?;
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod converter;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod identity;
pub mod message;

mod consumer;
mod publisher;

pub use client::QueueClient;
pub use config::{ClientConfig, DispatchConfig, ProducerConfig};
pub use dispatch::{DispatchSnapshot, DispatchStats, Outcome};
pub use error::{ErrorKind, QueueError, QueueResult};
pub use handler::{handler_fn, FnHandler, HandlerError, MessageHandler};
pub use message::Message;

#[cfg(test)]
mod tests;
