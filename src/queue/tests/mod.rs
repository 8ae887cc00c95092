//! Test modules for the queue client
//!
//! Most suites run against [`support::FakeBroker`], which records every
//! broker call; `memory` runs the same flows on the in-process broker.

mod support;

use crate::queue::{ClientConfig, ProducerConfig};

/// Client configuration with the given producer topics and fast retries
pub(crate) fn test_config(producers: &[&str]) -> ClientConfig {
    let mut config = ClientConfig::new("fake://broker");
    config.producers = producers.iter().map(|t| ProducerConfig::new(*t)).collect();
    config.dispatch.receive_retry_delay_ms = 10;
    config
}
