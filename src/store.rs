//! The storage contract shared by every backend, and backend construction.

use crate::config::{BackendConfig, NotifyStrategy, StoreConfig};
use crate::error::Result;
use crate::memory::MemoryStore;
use crate::postgres::PostgresStore;
use crate::relay::connect_relay;
use crate::subscriptions::{NotifyStatsSnapshot, SubscriptionHandle, SubscriptionId};
use crate::types::{Comment, CommentId, Post, PostId};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Posts, comments, and live comment subscriptions.
///
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait Storage: Send + Sync {
    /// All posts, in no particular order.
    async fn list_posts(&self) -> Result<Vec<Post>>;

    /// A post with its comment tree, or `PostNotFound`.
    async fn get_post(&self, id: &PostId) -> Result<Post>;

    /// A comment with its replies, or `CommentNotFound`. Orphans are
    /// reachable here even though no tree contains them.
    async fn get_comment(&self, id: &CommentId) -> Result<Comment>;

    /// Store a new post with no comments.
    async fn create_post(&self, title: &str, content: &str, comments_enabled: bool) -> Result<Post>;

    /// Store a new comment and notify the post's subscribers.
    ///
    /// Fails with `InvalidOperation`, without touching stored state, if the
    /// post does not exist or has comments disabled. A `parent_id` that does
    /// not resolve to a comment of the same post yields an orphan. A failed
    /// notification does not fail the call.
    async fn create_comment(
        &self,
        post_id: &PostId,
        parent_id: Option<&CommentId>,
        content: &str,
    ) -> Result<Comment>;

    /// Start receiving comments created under `post_id` from now on.
    async fn subscribe(&self, post_id: &PostId) -> Result<SubscriptionHandle>;

    /// Release a subscription. Returns false if it was not live.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Deliver `comment` to every current subscriber of `post_id`.
    async fn notify(&self, post_id: &PostId, comment: &Comment);

    /// Delivery counters.
    fn stats(&self) -> NotifyStatsSnapshot;
}

/// Build the backend selected by `config`.
///
/// The Postgres backend runs pending migrations before it is returned.
pub async fn open(config: StoreConfig) -> Result<Arc<dyn Storage>> {
    let StoreConfig {
        backend,
        subscription,
    } = config;

    match backend {
        BackendConfig::Memory {
            notify: NotifyStrategy::Direct,
        } => {
            info!("Opening in-memory store with direct fan-out");
            Ok(Arc::new(MemoryStore::new(subscription)))
        }
        BackendConfig::Memory {
            notify: NotifyStrategy::Relay(relay),
        } => {
            info!(relay = ?relay, "Opening in-memory store with relay fan-out");
            let relay = connect_relay(&relay).await?;
            Ok(Arc::new(MemoryStore::with_relay(relay, subscription)))
        }
        BackendConfig::Postgres {
            url,
            max_connections,
            relay,
        } => {
            info!(max_connections, relay = ?relay, "Opening postgres store");
            let relay = connect_relay(&relay).await?;
            let store = PostgresStore::connect(&url, max_connections, relay, subscription).await?;
            store.run_migrations().await?;
            Ok(Arc::new(store))
        }
    }
}
