//! Memory broker consumer

use crate::broker::error::{BrokerError, BrokerResult};
use crate::broker::memory::state::{Attachment, MemoryBroker, Poll};
use crate::broker::traits::BrokerConsumer;
use crate::broker::types::{BrokerMessage, ConsumerOptions, MessageId};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub struct MemoryConsumer {
    broker: Arc<MemoryBroker>,
    options: ConsumerOptions,
    consumer_id: u64,
    notify: Arc<Notify>,
    closed: AtomicBool,
}

impl MemoryConsumer {
    pub(crate) fn new(
        broker: Arc<MemoryBroker>,
        options: ConsumerOptions,
        attachment: Attachment,
    ) -> Self {
        Self {
            broker,
            options,
            consumer_id: attachment.consumer_id,
            notify: attachment.notify,
            closed: AtomicBool::new(false),
        }
    }

    pub fn subscription(&self) -> &str {
        &self.options.subscription_name
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn closed_error(&self) -> BrokerError {
        BrokerError::ConsumerClosed {
            consumer: self.options.name.clone(),
        }
    }
}

#[async_trait]
impl BrokerConsumer for MemoryConsumer {
    fn name(&self) -> &str {
        &self.options.name
    }

    async fn receive(&self) -> BrokerResult<BrokerMessage> {
        loop {
            // Register interest before looking at the backlog so a publish
            // between the poll and the wait is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_closed() {
                return Err(self.closed_error());
            }

            match self.broker.poll(
                &self.options.topic,
                &self.options.subscription_name,
                self.consumer_id,
            )? {
                Poll::Ready(message) => return Ok(message),
                Poll::Pending {
                    deadline: Some(deadline),
                } => {
                    let deadline = tokio::time::Instant::from_std(deadline);
                    let _ = tokio::time::timeout_at(deadline, notified).await;
                }
                Poll::Pending { deadline: None } => notified.await,
            }
        }
    }

    async fn ack(&self, id: MessageId) -> BrokerResult<()> {
        if self.is_closed() {
            return Err(self.closed_error());
        }
        self.broker.ack(
            &self.options.topic,
            &self.options.subscription_name,
            self.consumer_id,
            id,
        )
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.broker.detach(
            &self.options.topic,
            &self.options.subscription_name,
            self.consumer_id,
        );
        // Wake a receive blocked on this consumer
        self.notify.notify_waiters();
        log::debug!("memory broker: consumer {} closed", self.options.name);
    }
}
