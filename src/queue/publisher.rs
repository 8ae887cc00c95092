//! Producer registry
//!
//! Producers are created once, while the client is being built, one per
//! configured topic. After construction the registry is only read, so
//! lookups from concurrent `produce` calls need no locking.

use crate::broker::{BrokerProducer, ProducerOptions};
use std::collections::HashMap;
use std::sync::Arc;

/// A live producer together with the options it was created with
pub(crate) struct ProducerEntry {
    pub topic: String,
    pub producer: Arc<dyn BrokerProducer>,
    pub options: ProducerOptions,
}

#[derive(Default)]
pub(crate) struct ProducerRegistry {
    entries: HashMap<String, ProducerEntry>,
}

impl ProducerRegistry {
    /// Register a producer; false if the topic already has one
    pub(crate) fn insert(&mut self, entry: ProducerEntry) -> bool {
        if self.entries.contains_key(&entry.topic) {
            return false;
        }
        self.entries.insert(entry.topic.clone(), entry);
        true
    }

    pub(crate) fn get(&self, topic: &str) -> Option<&ProducerEntry> {
        self.entries.get(topic)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.entries.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Remove every producer, ordered by topic
    pub(crate) fn drain(&mut self) -> Vec<ProducerEntry> {
        let mut entries: Vec<ProducerEntry> = self.entries.drain().map(|(_, e)| e).collect();
        entries.sort_by(|a, b| a.topic.cmp(&b.topic));
        entries
    }

    /// Flush and close every producer
    ///
    /// A failed flush is logged and the producer is still closed; buffered
    /// messages in that producer may be lost.
    pub(crate) async fn close_all(&mut self) {
        for entry in self.drain() {
            if let Err(e) = entry.producer.flush().await {
                log::warn!("flush producer for topic {} failed: {}", entry.topic, e);
            }
            entry.producer.close().await;
            log::debug!("producer for topic {} closed", entry.topic);
        }
    }
}
