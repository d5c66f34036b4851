//! Error handling and edge case tests.

use commentary::{
    CommentId, ErrorKind, LocalRelay, MemoryStore, PostId, Relay, Result, Storage, StoreError,
    SubscriptionConfig,
};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::sync::Arc;

fn test_store() -> MemoryStore {
    MemoryStore::new(SubscriptionConfig::default())
}

// --- Not Found ---

#[tokio::test]
async fn test_get_missing_post() {
    let store = test_store();

    let result = store.get_post(&PostId::from("nonexistent")).await;
    assert!(matches!(result, Err(StoreError::PostNotFound(_))));
}

#[tokio::test]
async fn test_get_missing_comment() {
    let store = test_store();

    let result = store.get_comment(&CommentId::from("nonexistent")).await;
    let err = result.unwrap_err();
    assert!(matches!(err, StoreError::CommentNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// --- Invalid Operations ---

#[tokio::test]
async fn test_comment_on_disabled_post() {
    let store = test_store();
    let post = store.create_post("A", "B", false).await.unwrap();

    let result = store.create_comment(&post.id, None, "hi").await;
    assert!(matches!(result, Err(StoreError::InvalidOperation(_))));

    // State should be untouched
    let fetched = store.get_post(&post.id).await.unwrap();
    assert!(fetched.comments.is_empty());
    assert_eq!(fetched, post);
}

#[tokio::test]
async fn test_reply_on_disabled_post() {
    let store = test_store();
    let post = store.create_post("A", "B", false).await.unwrap();

    let result = store
        .create_comment(&post.id, Some(&CommentId::from("any")), "reply")
        .await;
    assert!(matches!(result, Err(StoreError::InvalidOperation(_))));
}

#[tokio::test]
async fn test_comment_on_missing_post() {
    let store = test_store();

    let result = store
        .create_comment(&PostId::from("nonexistent"), None, "hi")
        .await;
    assert!(matches!(result, Err(StoreError::InvalidOperation(_))));
    assert!(store.list_posts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_comment_not_delivered() {
    let store = test_store();
    let post = store.create_post("A", "B", false).await.unwrap();
    let mut handle = store.subscribe(&post.id).await.unwrap();

    let _ = store.create_comment(&post.id, None, "hi").await;

    assert!(handle.try_recv().is_err());
    assert_eq!(store.stats().delivered, 0);
}

// --- Silent Notification Failures ---

/// Relay whose publishes always fail.
struct UnreachableRelay {
    inner: LocalRelay,
}

#[async_trait]
impl Relay for UnreachableRelay {
    async fn publish(&self, _topic: &str, _payload: String) -> Result<()> {
        Err(StoreError::Relay(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "connection refused",
        ))))
    }

    async fn subscribe(&self, topic: &str) -> Result<BoxStream<'static, String>> {
        self.inner.subscribe(topic).await
    }
}

#[tokio::test]
async fn test_publish_failure_does_not_fail_create() {
    let relay = Arc::new(UnreachableRelay {
        inner: LocalRelay::new(),
    });
    let store = MemoryStore::with_relay(relay, SubscriptionConfig::default());
    let post = store.create_post("A", "B", true).await.unwrap();

    let comment = store.create_comment(&post.id, None, "hi").await.unwrap();

    // Persisted, but the notification was counted as lost
    assert_eq!(store.get_comment(&comment.id).await.unwrap().content, "hi");
    assert_eq!(store.stats().publish_failures, 1);
    assert_eq!(store.stats().delivered, 0);
}

#[tokio::test]
async fn test_subscribe_to_unknown_post_allowed() {
    let store = test_store();

    let mut handle = store.subscribe(&PostId::from("not-yet")).await.unwrap();
    assert!(handle.try_recv().is_err());
    assert_eq!(store.subscription_count(), 1);
}

#[tokio::test]
async fn test_unsubscribe_unknown_id() {
    let store = test_store();
    assert!(!store.unsubscribe(commentary::SubscriptionId(42)));
}
