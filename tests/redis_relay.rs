//! Redis relay tests.
//!
//! These need a Redis server at `REDIS_ADDR` (default `localhost:6379`); run
//! them with `cargo test -- --ignored`.

use commentary::{MemoryStore, RedisRelay, Relay, Storage, SubscriptionConfig};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;

fn redis_addr() -> String {
    std::env::var("REDIS_ADDR").unwrap_or_else(|_| "localhost:6379".to_string())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore]
async fn test_publish_reaches_subscriber() {
    let relay = RedisRelay::connect(&redis_addr()).await.unwrap();
    let topic = format!("test:{}", uuid::Uuid::new_v4());

    let mut stream = relay.subscribe(&topic).await.unwrap();
    relay.publish(&topic, "payload".to_string()).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .unwrap();
    assert_eq!(received.as_deref(), Some("payload"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore]
async fn test_comments_cross_store_instances() {
    let addr = redis_addr();
    let writer = MemoryStore::with_relay(
        Arc::new(RedisRelay::connect(&addr).await.unwrap()),
        SubscriptionConfig::default(),
    );
    let reader = MemoryStore::with_relay(
        Arc::new(RedisRelay::connect(&addr).await.unwrap()),
        SubscriptionConfig::default(),
    );

    let post = writer.create_post("A", "B", true).await.unwrap();
    let mut handle = reader.subscribe(&post.id).await.unwrap();
    let comment = writer.create_comment(&post.id, None, "hi").await.unwrap();

    let received = handle.next_comment(Duration::from_secs(2)).await;
    assert_eq!(received, Some(comment));
}
