#[tokio::main]
async fn main() {
    brokerlink::app::startup::startup().await;
}
