//! CLI TOML configuration tests

use brokerlink::app::cli::config::{load_client_config, load_config_file, resolve_config_path};
use brokerlink::app::cli::Args;
use brokerlink::broker::CompressionType;
use brokerlink::queue::ErrorKind;
use std::fs;
use tempfile::TempDir;

const FULL_CONFIG: &str = r#"
url = "memory://local"
operation_timeout_ms = 5000
send_timeout_ms = 2000
compression = "snappy"

[[producers]]
topic = "orders"
batching_max_publish_delay = 10
batching_max_messages = 10
batching_max_size = 128

[[producers]]
topic = "invoices"

[dispatch]
max_redeliveries = 5
receive_retry_delay_ms = 250
"#;

#[tokio::test]
async fn test_full_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("brokerlink.toml");
    fs::write(&path, FULL_CONFIG).unwrap();

    let config = load_config_file(&path).await.unwrap();
    assert_eq!(config.url, "memory://local");
    assert_eq!(config.operation_timeout_ms, 5000);
    assert_eq!(config.send_timeout_ms, 2000);
    assert_eq!(config.compression, CompressionType::Snappy);
    assert_eq!(config.producers.len(), 2);
    assert_eq!(config.producers[0].batching_max_size_bytes(), 128 * 1024);
    assert_eq!(config.producers[1].batching_max_messages, 1000);
    assert_eq!(config.dispatch.max_redeliveries, 5);
    assert_eq!(config.dispatch.receive_retry_delay_ms, 250);
}

#[tokio::test]
async fn test_cli_url_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("brokerlink.toml");
    fs::write(&path, FULL_CONFIG).unwrap();

    let args = Args {
        config_file: Some(path),
        url: Some("memory://override".to_string()),
        ..Args::default()
    };
    let config = load_client_config(&args).await.unwrap();
    assert_eq!(config.url, "memory://override");
    assert_eq!(config.producers.len(), 2);
}

#[tokio::test]
async fn test_duplicate_producer_topic_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("brokerlink.toml");
    fs::write(
        &path,
        "url = \"memory://local\"\n[[producers]]\ntopic = \"orders\"\n[[producers]]\ntopic = \"orders\"\n",
    )
    .unwrap();

    let args = Args {
        config_file: Some(path),
        ..Args::default()
    };
    let err = load_client_config(&args).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_explicit_missing_file_rejected() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");
    assert!(resolve_config_path(Some(&missing)).is_err());
}

#[tokio::test]
async fn test_unknown_compression_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("brokerlink.toml");
    fs::write(&path, "url = \"memory://local\"\ncompression = \"brotli\"\n").unwrap();

    let err = load_config_file(&path).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}
