//! End-to-end produce/consume tests

use crate::common::{eventually, CollectingHandler, RecordingConnector};
use brokerlink::broker::memory::MemoryConnector;
use brokerlink::queue::identity;
use brokerlink::queue::{ClientConfig, ErrorKind, Message, ProducerConfig, QueueClient};
use std::time::Duration;

fn config(producers: &[&str]) -> ClientConfig {
    let mut config = ClientConfig::new("memory://integration");
    config.producers = producers.iter().map(|t| ProducerConfig::new(*t)).collect();
    config
}

#[tokio::test]
async fn test_orders_invoices_scenario() {
    let connector = RecordingConnector::new(MemoryConnector::new());
    let client = QueueClient::new(config(&["orders", "invoices"]), &connector)
        .await
        .unwrap();

    let orders = CollectingHandler::default();
    client
        .new_consumer("orders", "billing", orders.clone())
        .await
        .unwrap();
    assert_eq!(
        client.consumer_name("orders").await,
        Some(identity::consumer_name("orders", "billing"))
    );

    client
        .produce("orders", Message::new("orders", b"order-1".to_vec()))
        .await
        .unwrap();
    client
        .produce("invoices", Message::new("invoices", b"inv-1".to_vec()))
        .await
        .unwrap();
    assert!(eventually(|| orders.payloads() == vec!["order-1"]).await);

    let err = client
        .produce("shipments", Message::new("shipments", b"s-1".to_vec()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!connector.calls().iter().any(|c| c == "send:shipments"));

    let err = client
        .new_consumer("orders", "audit", CollectingHandler::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    let subscribes: Vec<String> = connector
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("subscribe:"))
        .collect();
    assert_eq!(subscribes, vec!["subscribe:orders:billing:Shared"]);

    client.close().await;
}

#[tokio::test]
async fn test_failed_message_is_redelivered() {
    let connector = RecordingConnector::new(MemoryConnector::with_ack_timeout(
        Duration::from_millis(50),
    ));
    let client = QueueClient::new(config(&["orders"]), &connector)
        .await
        .unwrap();

    let handler = CollectingHandler::default();
    client
        .new_consumer("orders", "billing", handler.clone())
        .await
        .unwrap();

    client
        .produce("orders", Message::new("orders", b"fail-once".to_vec()))
        .await
        .unwrap();

    // seen at least twice: the first delivery and one redelivery
    assert!(eventually(|| handler.payloads().len() >= 2).await);
    assert!(handler.payloads().iter().all(|p| p == "fail-once"));

    client.close().await;
}

#[tokio::test]
async fn test_two_clients_share_a_group() {
    let memory = MemoryConnector::new();
    let producer_side = QueueClient::new(config(&["orders"]), &memory)
        .await
        .unwrap();
    let consumer_a = QueueClient::new(config(&[]), &memory).await.unwrap();
    let consumer_b = QueueClient::new(config(&[]), &memory).await.unwrap();

    let a = CollectingHandler::default();
    let b = CollectingHandler::default();
    consumer_a
        .new_consumer("orders", "billing", a.clone())
        .await
        .unwrap();
    consumer_b
        .new_consumer("orders", "billing", b.clone())
        .await
        .unwrap();

    for i in 0..30 {
        producer_side
            .produce(
                "orders",
                Message::new("orders", format!("order-{}", i).into_bytes()),
            )
            .await
            .unwrap();
    }

    assert!(eventually(|| a.payloads().len() + b.payloads().len() == 30).await);
    let mut all = a.payloads();
    all.extend(b.payloads());
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 30);

    producer_side.close().await;
    consumer_a.close().await;
    consumer_b.close().await;
}
