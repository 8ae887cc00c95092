//! Application startup
//!
//! Parses arguments, initialises logging, builds the queue client and runs
//! until a shutdown signal arrives. Fatal errors are logged and end the
//! process with status 1.

use crate::app::cli::args::Args;
use crate::app::cli::config::load_client_config;
use crate::broker::memory::MemoryConnector;
use crate::broker::BrokerConnector;
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::init_logging;
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::version;
use crate::queue::{HandlerError, Message, MessageHandler, QueueClient, QueueError, QueueResult};
use async_trait::async_trait;
use clap::Parser;
use tokio::sync::broadcast;

/// Handler registered for `--consume`: logs every message
pub struct LoggingHandler;

#[async_trait]
impl MessageHandler for LoggingHandler {
    async fn handle(&self, message: Message) -> Result<(), HandlerError> {
        log::info!(
            "[{}] key={} redelivery={} payload='{}'",
            message.topic,
            message.key.as_deref().unwrap_or("-"),
            message.redelivery_count,
            message.payload_lossy()
        );
        Ok(())
    }
}

pub async fn startup() {
    let args = Args::parse();

    let log_file = args.log_file.as_ref().map(|p| p.to_string_lossy().to_string());
    if let Err(e) = init_logging(
        args.log_level.as_deref(),
        args.log_format.as_deref(),
        log_file.as_deref(),
        args.use_color(),
    ) {
        eprintln!("Error initializing logging: {}", e);
        std::process::exit(1);
    }
    log::info!("{} starting", version::banner());

    let connector = MemoryConnector::new();
    let result = ShutdownCoordinator::guard_with_coordinator(|_coordinator, shutdown_rx| {
        run(args, &connector, shutdown_rx)
    })
    .await;

    if let Err(e) = result {
        log_error_with_context(&e, "Running broker client");
        std::process::exit(1);
    }
    log::info!("brokerlink stopped");
}

/// Register consumers, send startup messages and wait for shutdown
///
/// Returns once `shutdown_rx` fires, or straight after sending when no
/// consumer was requested. The client is closed on every path after it
/// was created.
pub async fn run(
    args: Args,
    connector: &dyn BrokerConnector,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> QueueResult<()> {
    let consumers = args.consumer_specs().map_err(QueueError::invalid_argument)?;
    let messages = args.produce_specs().map_err(QueueError::invalid_argument)?;
    let config = load_client_config(&args).await?;

    let client = QueueClient::new(config, connector).await?;
    if let Err(e) = register_and_send(&client, consumers, messages).await {
        client.close().await;
        return Err(e);
    }

    if client.consumer_topics().await.is_empty() {
        log::info!("no consumers registered; closing");
    } else {
        log::info!("consuming until a shutdown signal arrives");
        let _ = shutdown_rx.recv().await;
        log::info!("shutdown requested");
    }

    client.close().await;
    Ok(())
}

async fn register_and_send(
    client: &QueueClient,
    consumers: Vec<(String, String)>,
    messages: Vec<(String, String)>,
) -> QueueResult<()> {
    for (topic, group) in consumers {
        client.new_consumer(&topic, &group, LoggingHandler).await?;
    }

    for (topic, payload) in messages {
        let message = Message::new(topic.clone(), payload.into_bytes());
        let id = client.produce(&topic, message).await?;
        log::info!("sent message {} to topic {}", id, topic);
    }
    Ok(())
}
