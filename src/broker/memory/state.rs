//! Shared in-process broker state
//!
//! One [`MemoryBroker`] holds every topic and subscription. Each subscription
//! keeps its own backlog plus the set of deliveries that are out with a
//! consumer and not yet acknowledged. Deliveries that outlive the ack timeout,
//! or whose consumer closes, go back to the backlog with their redelivery
//! count incremented.

use crate::broker::error::{BrokerError, BrokerResult};
use crate::broker::types::{BrokerMessage, MessageId, OutboundMessage, SubscriptionType};
use crate::core::sync::handle_mutex_poison;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::Notify;

/// A delivery handed to a consumer and awaiting acknowledgement
#[derive(Debug)]
struct InFlight {
    message: BrokerMessage,
    consumer_id: u64,
    deadline: Instant,
}

#[derive(Debug)]
struct Subscription {
    subscription_type: SubscriptionType,
    backlog: VecDeque<BrokerMessage>,
    in_flight: HashMap<MessageId, InFlight>,
    consumers: Vec<u64>,
    notify: Arc<Notify>,
}

impl Subscription {
    fn new(subscription_type: SubscriptionType) -> Self {
        Self {
            subscription_type,
            backlog: VecDeque::new(),
            in_flight: HashMap::new(),
            consumers: Vec::new(),
            notify: Arc::new(Notify::new()),
        }
    }

    fn redeliver(&mut self, mut message: BrokerMessage) {
        message.redelivery_count = message.redelivery_count.saturating_add(1);
        self.backlog.push_back(message);
    }

    /// Move deliveries whose ack deadline passed back into the backlog
    fn reclaim_expired(&mut self, now: Instant) -> usize {
        let mut expired: Vec<MessageId> = self
            .in_flight
            .iter()
            .filter(|(_, delivery)| delivery.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        expired.sort();

        for id in &expired {
            if let Some(delivery) = self.in_flight.remove(id) {
                self.redeliver(delivery.message);
            }
        }
        expired.len()
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.in_flight.values().map(|d| d.deadline).min()
    }
}

#[derive(Debug, Default)]
struct Topic {
    subscriptions: HashMap<String, Subscription>,
}

/// Result of a non-blocking receive attempt
#[derive(Debug)]
pub(crate) enum Poll {
    Ready(BrokerMessage),
    /// Nothing to deliver; an in-flight delivery may expire at `deadline`
    Pending { deadline: Option<Instant> },
}

/// Handle returned when a consumer attaches to a subscription
#[derive(Debug, Clone)]
pub(crate) struct Attachment {
    pub consumer_id: u64,
    pub notify: Arc<Notify>,
}

/// In-process broker shared by every connection of a [`super::MemoryConnector`]
#[derive(Debug)]
pub struct MemoryBroker {
    /// Monotonic entry counter; ids start at 1
    next_entry_id: AtomicU64,
    next_consumer_id: AtomicU64,
    topics: Mutex<HashMap<String, Topic>>,
    ack_timeout: Duration,
}

impl MemoryBroker {
    pub fn new(ack_timeout: Duration) -> Self {
        Self {
            next_entry_id: AtomicU64::new(1),
            next_consumer_id: AtomicU64::new(1),
            topics: Mutex::new(HashMap::new()),
            ack_timeout,
        }
    }

    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    fn lock_topics(&self) -> BrokerResult<MutexGuard<'_, HashMap<String, Topic>>> {
        handle_mutex_poison(self.topics.lock(), |message| BrokerError::Connection {
            message,
        })
    }

    pub(crate) fn allocate_id(&self) -> MessageId {
        MessageId::new(self.next_entry_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Append messages to every subscription of `topic`
    ///
    /// Subscriptions only see messages published after they were created.
    pub(crate) fn publish(
        &self,
        topic: &str,
        entries: Vec<(MessageId, OutboundMessage)>,
    ) -> BrokerResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut topics = self.lock_topics()?;
        let topic_state = topics.entry(topic.to_string()).or_default();
        let publish_time = SystemTime::now();

        for subscription in topic_state.subscriptions.values_mut() {
            for (id, message) in &entries {
                subscription.backlog.push_back(BrokerMessage {
                    id: *id,
                    topic: topic.to_string(),
                    key: message.key.clone(),
                    payload: message.payload.clone(),
                    redelivery_count: 0,
                    publish_time,
                });
            }
            subscription.notify.notify_waiters();
        }

        log::trace!("memory broker: {} message(s) published to {}", entries.len(), topic);
        Ok(())
    }

    pub(crate) fn attach(
        &self,
        topic: &str,
        subscription: &str,
        subscription_type: SubscriptionType,
    ) -> BrokerResult<Attachment> {
        let mut topics = self.lock_topics()?;
        let state = topics
            .entry(topic.to_string())
            .or_default()
            .subscriptions
            .entry(subscription.to_string())
            .or_insert_with(|| Subscription::new(subscription_type));

        let subscribe_error = |message: &str| BrokerError::Subscribe {
            topic: topic.to_string(),
            subscription: subscription.to_string(),
            message: message.to_string(),
        };

        if state.subscription_type != subscription_type {
            return Err(subscribe_error(&format!(
                "subscription type is {}, requested {}",
                state.subscription_type, subscription_type
            )));
        }
        if state.subscription_type == SubscriptionType::Exclusive && !state.consumers.is_empty() {
            return Err(subscribe_error("exclusive subscription already has a consumer"));
        }

        let consumer_id = self.next_consumer_id.fetch_add(1, Ordering::SeqCst);
        state.consumers.push(consumer_id);

        Ok(Attachment {
            consumer_id,
            notify: Arc::clone(&state.notify),
        })
    }

    /// Remove a consumer and return its unacknowledged deliveries to the backlog
    pub(crate) fn detach(&self, topic: &str, subscription: &str, consumer_id: u64) {
        let mut topics = match self.lock_topics() {
            Ok(topics) => topics,
            Err(e) => {
                log::warn!("memory broker: detach of consumer {} skipped: {}", consumer_id, e);
                return;
            }
        };
        let Some(state) = topics
            .get_mut(topic)
            .and_then(|t| t.subscriptions.get_mut(subscription))
        else {
            return;
        };

        state.consumers.retain(|id| *id != consumer_id);

        let mut orphaned: Vec<MessageId> = state
            .in_flight
            .iter()
            .filter(|(_, delivery)| delivery.consumer_id == consumer_id)
            .map(|(id, _)| *id)
            .collect();
        orphaned.sort();
        for id in orphaned {
            if let Some(delivery) = state.in_flight.remove(&id) {
                state.redeliver(delivery.message);
            }
        }

        state.notify.notify_waiters();
    }

    pub(crate) fn poll(
        &self,
        topic: &str,
        subscription: &str,
        consumer_id: u64,
    ) -> BrokerResult<Poll> {
        let mut topics = self.lock_topics()?;
        let state = topics
            .get_mut(topic)
            .and_then(|t| t.subscriptions.get_mut(subscription))
            .ok_or_else(|| BrokerError::Receive {
                message: format!("subscription [{}] on [{}] does not exist", subscription, topic),
            })?;

        let now = Instant::now();
        let reclaimed = state.reclaim_expired(now);
        if reclaimed > 0 {
            log::debug!(
                "memory broker: {} unacknowledged message(s) on {}/{} scheduled for redelivery",
                reclaimed,
                topic,
                subscription
            );
        }

        match state.backlog.pop_front() {
            Some(message) => {
                state.in_flight.insert(
                    message.id,
                    InFlight {
                        message: message.clone(),
                        consumer_id,
                        deadline: now + self.ack_timeout,
                    },
                );
                Ok(Poll::Ready(message))
            }
            None => Ok(Poll::Pending {
                deadline: state.next_deadline(),
            }),
        }
    }

    pub(crate) fn ack(
        &self,
        topic: &str,
        subscription: &str,
        consumer_id: u64,
        id: MessageId,
    ) -> BrokerResult<()> {
        let mut topics = self.lock_topics()?;
        let outstanding = topics
            .get_mut(topic)
            .and_then(|t| t.subscriptions.get_mut(subscription))
            .filter(|state| {
                state
                    .in_flight
                    .get(&id)
                    .is_some_and(|delivery| delivery.consumer_id == consumer_id)
            });

        match outstanding {
            Some(state) => {
                state.in_flight.remove(&id);
                Ok(())
            }
            None => Err(BrokerError::Ack {
                message_id: id.to_string(),
                message: "message is not outstanding for this consumer".to_string(),
            }),
        }
    }

    /// Messages waiting for delivery on a subscription
    pub fn backlog_len(&self, topic: &str, subscription: &str) -> usize {
        self.lock_topics()
            .ok()
            .and_then(|topics| {
                topics
                    .get(topic)
                    .and_then(|t| t.subscriptions.get(subscription))
                    .map(|s| s.backlog.len())
            })
            .unwrap_or(0)
    }

    /// Deliveries handed out on a subscription and not yet acknowledged
    pub fn unacked_len(&self, topic: &str, subscription: &str) -> usize {
        self.lock_topics()
            .ok()
            .and_then(|topics| {
                topics
                    .get(topic)
                    .and_then(|t| t.subscriptions.get(subscription))
                    .map(|s| s.in_flight.len())
            })
            .unwrap_or(0)
    }
}
