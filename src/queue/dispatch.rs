//! Per-consumer dispatch loop
//!
//! One loop runs per registered consumer. Each iteration receives a single
//! message, applies the redelivery policy, runs the handler and acknowledges
//! on success. Messages for one consumer are handled strictly one at a time
//! in receive order.
//!
//! The loop ends when the consumer reports that it is closed or when the
//! client's shutdown signal fires. Shutdown is only observed while waiting
//! for a message, so a handler that is already running always completes and
//! its acknowledgement is sent before the loop exits.

use crate::broker::{BrokerConsumer, BrokerError, BrokerMessage, BrokerResult};
use crate::core::retry::{retry_async_when, RetryPolicy};
use crate::queue::config::DispatchConfig;
use crate::queue::converter;
use crate::queue::handler::{HandlerError, MessageHandler};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// What happened to a single received message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Handler succeeded and the message was acknowledged
    Acked,
    /// Redelivery limit exceeded; acknowledged without running the handler
    Poisoned,
    /// Handler failed; left unacknowledged for redelivery
    HandlerFailed,
    /// Handler succeeded but the acknowledgement was rejected
    AckFailed,
}

/// Running counters for one dispatch loop
#[derive(Debug, Default)]
pub struct DispatchStats {
    received: AtomicU64,
    acked: AtomicU64,
    poisoned: AtomicU64,
    handler_failures: AtomicU64,
    ack_failures: AtomicU64,
    receive_errors: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchSnapshot {
    pub received: u64,
    pub acked: u64,
    pub poisoned: u64,
    pub handler_failures: u64,
    pub ack_failures: u64,
    pub receive_errors: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            received: self.received.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            poisoned: self.poisoned.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            ack_failures: self.ack_failures.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Acked => &self.acked,
            Outcome::Poisoned => &self.poisoned,
            Outcome::HandlerFailed => &self.handler_failures,
            Outcome::AckFailed => &self.ack_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

pub(crate) struct DispatchLoop {
    topic: String,
    consumer: Arc<dyn BrokerConsumer>,
    handler: Arc<dyn MessageHandler>,
    config: DispatchConfig,
    stats: Arc<DispatchStats>,
    shutdown_rx: broadcast::Receiver<()>,
    shutdown_requested: Arc<AtomicBool>,
}

impl DispatchLoop {
    pub(crate) fn new(
        topic: String,
        consumer: Arc<dyn BrokerConsumer>,
        handler: Arc<dyn MessageHandler>,
        config: DispatchConfig,
        stats: Arc<DispatchStats>,
        shutdown_rx: broadcast::Receiver<()>,
        shutdown_requested: Arc<AtomicBool>,
    ) -> Self {
        Self {
            topic,
            consumer,
            handler,
            config,
            stats,
            shutdown_rx,
            shutdown_requested,
        }
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub(crate) async fn run(mut self) {
        log::debug!(
            "dispatch loop started for consumer {} on topic {}",
            self.consumer.name(),
            self.topic
        );
        let retry_policy = self.config.receive_retry_policy();

        loop {
            if self.shutdown_requested.load(Ordering::Acquire) {
                break;
            }

            let received = tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => break,
                received = receive_with_retry(self.consumer.as_ref(), retry_policy.clone()) => received,
            };

            match received {
                Ok(message) => {
                    self.process(message).await;
                }
                Err(e) if e.is_closed() => {
                    log::info!(
                        "consumer {} closed, stopping dispatch for topic {}",
                        self.consumer.name(),
                        self.topic
                    );
                    break;
                }
                Err(e) => {
                    self.stats.receive_errors.fetch_add(1, Ordering::Relaxed);
                    log::error!(
                        "receive message failed: {}, consumer: {} topic: {}",
                        e,
                        self.consumer.name(),
                        self.topic
                    );
                    if !self.back_off(retry_policy.delay).await {
                        break;
                    }
                }
            }
        }

        log::debug!(
            "dispatch loop stopped for consumer {} on topic {}",
            self.consumer.name(),
            self.topic
        );
    }

    /// Wait before the next receive round; false if shutdown arrived meanwhile
    async fn back_off(&mut self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown_rx.recv() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Apply the redelivery policy and run the handler for one message
    pub(crate) async fn process(&self, message: BrokerMessage) -> Outcome {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        if message.redelivery_count > self.config.max_redeliveries {
            log::error!(
                "message redelivery count exceed {}, message msgId: {} -- content: '{}'",
                self.config.max_redeliveries,
                message.id,
                message.payload_lossy()
            );
            if !self.ack(&message).await {
                self.stats.record(Outcome::AckFailed);
            }
            self.stats.record(Outcome::Poisoned);
            return Outcome::Poisoned;
        }

        log::debug!(
            "Received message msgId: {} -- content: '{}'",
            message.id,
            message.payload_lossy()
        );

        let handled = AssertUnwindSafe(self.handler.handle(converter::from_broker(&message)))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(HandlerError::Panicked {
                    message: panic_message(panic.as_ref()),
                })
            });

        let outcome = match handled {
            Err(e) => {
                log::error!(
                    "handle message failed: {}, message msgId: {} -- content: '{}'",
                    e,
                    message.id,
                    message.payload_lossy()
                );
                Outcome::HandlerFailed
            }
            Ok(()) => {
                if self.ack(&message).await {
                    Outcome::Acked
                } else {
                    Outcome::AckFailed
                }
            }
        };
        self.stats.record(outcome);
        outcome
    }

    /// Acknowledge once; failures are logged and never retried
    async fn ack(&self, message: &BrokerMessage) -> bool {
        match self.consumer.ack(message.id).await {
            Ok(()) => true,
            Err(e) => {
                log::error!(
                    "ack message failed: {}, message msgId: {} -- content: '{}'",
                    e,
                    message.id,
                    message.payload_lossy()
                );
                false
            }
        }
    }
}

async fn receive_with_retry(
    consumer: &dyn BrokerConsumer,
    policy: RetryPolicy,
) -> BrokerResult<BrokerMessage> {
    retry_async_when(
        "receive",
        policy,
        || consumer.receive(),
        |e: &BrokerError| !e.is_closed(),
    )
    .await
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
