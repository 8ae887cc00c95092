//! Consumer registry
//!
//! At most one consumer is registered per topic. Registration holds the
//! registry lock from the existence check until the entry is inserted, so
//! two concurrent registrations for one topic cannot both subscribe.
//!
//! The entry is published through [`Registration`], which inserts on drop.
//! Once the broker subscription exists the consumer is always recorded,
//! even if the caller's future is cancelled right after, so `close` still
//! reaches it.

use crate::broker::BrokerConsumer;
use crate::queue::dispatch::{DispatchSnapshot, DispatchStats};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;

pub(crate) type ConsumerMap = HashMap<String, ConsumerEntry>;

/// A live subscription and its dispatch loop
pub(crate) struct ConsumerEntry {
    pub topic: String,
    pub group: String,
    pub name: String,
    pub consumer: Arc<dyn BrokerConsumer>,
    pub stats: Arc<DispatchStats>,
    pub task: Option<JoinHandle<()>>,
}

#[derive(Default)]
pub(crate) struct ConsumerRegistry {
    entries: Mutex<ConsumerMap>,
}

impl ConsumerRegistry {
    pub(crate) async fn lock(&self) -> MutexGuard<'_, ConsumerMap> {
        self.entries.lock().await
    }

    pub(crate) async fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.entries.lock().await.keys().cloned().collect();
        topics.sort();
        topics
    }

    pub(crate) async fn name(&self, topic: &str) -> Option<String> {
        self.entries.lock().await.get(topic).map(|e| e.name.clone())
    }

    pub(crate) async fn stats(&self, topic: &str) -> Option<DispatchSnapshot> {
        self.entries
            .lock()
            .await
            .get(topic)
            .map(|e| e.stats.snapshot())
    }

    /// Remove every consumer, ordered by topic
    pub(crate) async fn drain(&self) -> Vec<ConsumerEntry> {
        let mut entries: Vec<ConsumerEntry> = self
            .entries
            .lock()
            .await
            .drain()
            .map(|(_, e)| e)
            .collect();
        entries.sort_by(|a, b| a.topic.cmp(&b.topic));
        entries
    }
}

/// Inserts a consumer entry into the locked registry when dropped
pub(crate) struct Registration<'a> {
    map: &'a mut ConsumerMap,
    entry: Option<ConsumerEntry>,
}

impl<'a> Registration<'a> {
    pub(crate) fn new(map: &'a mut ConsumerMap, entry: ConsumerEntry) -> Self {
        Self {
            map,
            entry: Some(entry),
        }
    }

    pub(crate) fn attach_task(&mut self, task: JoinHandle<()>) {
        if let Some(entry) = self.entry.as_mut() {
            entry.task = Some(task);
        }
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            log::debug!(
                "consumer {} registered for group {} topic {}",
                entry.name,
                entry.group,
                entry.topic
            );
            self.map.insert(entry.topic.clone(), entry);
        }
    }
}
