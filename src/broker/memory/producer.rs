//! Memory broker producer with client-side batching
//!
//! Sends are collected into a pending batch which is published when it
//! reaches `batching_max_messages` or `batching_max_size_bytes`, when the
//! publish delay elapses, on `flush`, and on `close`. A producer whose
//! `batching_max_messages` is 0 or 1, or whose delay is zero, publishes every
//! send immediately.

use crate::broker::error::{BrokerError, BrokerResult};
use crate::broker::memory::state::MemoryBroker;
use crate::broker::traits::BrokerProducer;
use crate::broker::types::{MessageId, OutboundMessage, ProducerOptions};
use crate::core::sync::handle_mutex_poison;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct PendingBatch {
    entries: Vec<(MessageId, OutboundMessage)>,
    bytes: usize,
}

impl PendingBatch {
    fn take(&mut self) -> Vec<(MessageId, OutboundMessage)> {
        self.bytes = 0;
        std::mem::take(&mut self.entries)
    }
}

struct Batcher {
    broker: Arc<MemoryBroker>,
    topic: String,
    pending: Mutex<PendingBatch>,
}

impl Batcher {
    fn lock_pending(&self) -> BrokerResult<std::sync::MutexGuard<'_, PendingBatch>> {
        handle_mutex_poison(self.pending.lock(), |message| BrokerError::Send {
            topic: self.topic.clone(),
            message,
        })
    }

    fn flush(&self) -> BrokerResult<usize> {
        let entries = self.lock_pending()?.take();
        let count = entries.len();
        self.broker.publish(&self.topic, entries)?;
        Ok(count)
    }
}

pub struct MemoryProducer {
    options: ProducerOptions,
    batcher: Arc<Batcher>,
    closed: AtomicBool,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryProducer {
    pub(crate) fn new(broker: Arc<MemoryBroker>, options: ProducerOptions) -> Self {
        let batcher = Arc::new(Batcher {
            broker,
            topic: options.topic.clone(),
            pending: Mutex::new(PendingBatch::default()),
        });

        let flusher = if Self::batching_enabled(&options) {
            Some(Self::spawn_flusher(
                Arc::downgrade(&batcher),
                options.batching_max_publish_delay,
            ))
        } else {
            None
        };

        Self {
            options,
            batcher,
            closed: AtomicBool::new(false),
            flusher: Mutex::new(flusher),
        }
    }

    fn batching_enabled(options: &ProducerOptions) -> bool {
        options.batching_max_messages > 1 && !options.batching_max_publish_delay.is_zero()
    }

    fn spawn_flusher(batcher: Weak<Batcher>, delay: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(delay);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(batcher) = batcher.upgrade() else {
                    break;
                };
                if let Err(e) = batcher.flush() {
                    log::warn!("memory broker: timed flush on {} failed: {}", batcher.topic, e);
                }
            }
        })
    }

    pub fn options(&self) -> &ProducerOptions {
        &self.options
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl BrokerProducer for MemoryProducer {
    fn topic(&self) -> &str {
        &self.options.topic
    }

    async fn send(&self, message: OutboundMessage) -> BrokerResult<MessageId> {
        if self.is_closed() {
            return Err(BrokerError::ProducerClosed {
                topic: self.options.topic.clone(),
            });
        }

        let id = self.batcher.broker.allocate_id();
        if !Self::batching_enabled(&self.options) {
            self.batcher
                .broker
                .publish(&self.options.topic, vec![(id, message)])?;
            return Ok(id);
        }

        let full = {
            let mut pending = self.batcher.lock_pending()?;
            pending.bytes += message.payload.len();
            pending.entries.push((id, message));
            pending.entries.len() >= self.options.batching_max_messages as usize
                || pending.bytes >= self.options.batching_max_size_bytes as usize
        };
        if full {
            self.batcher.flush()?;
        }
        Ok(id)
    }

    async fn flush(&self) -> BrokerResult<()> {
        let count = self.batcher.flush()?;
        if count > 0 {
            log::debug!(
                "memory broker: flushed {} message(s) on {}",
                count,
                self.options.topic
            );
        }
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Ok(mut flusher) = self.flusher.lock() {
            if let Some(handle) = flusher.take() {
                handle.abort();
            }
        }
        // Already-batched messages are published rather than lost
        if let Err(e) = self.batcher.flush() {
            log::warn!(
                "memory broker: final flush on {} failed: {}",
                self.options.topic,
                e
            );
        }
        log::debug!("memory broker: producer for {} closed", self.options.topic);
    }
}

impl Drop for MemoryProducer {
    fn drop(&mut self) {
        if let Ok(mut flusher) = self.flusher.lock() {
            if let Some(handle) = flusher.take() {
                handle.abort();
            }
        }
    }
}
