//! Transport-facing facade over a [`Storage`] backend.
//!
//! Maps the query, mutation, and subscription operations onto storage calls.
//! Errors pass through unchanged.

use crate::error::Result;
use crate::store::Storage;
use crate::subscriptions::{SubscriptionEvent, SubscriptionHandle, SubscriptionId};
use crate::types::{Comment, CommentId, Post, PostId};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Interval after which an idle subscription feed yields a keep-alive tick.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(10);

/// Query, mutation, and subscription entry points.
#[derive(Clone)]
pub struct Resolver {
    storage: Arc<dyn Storage>,
    keep_alive: Duration,
}

impl Resolver {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            keep_alive: DEFAULT_KEEP_ALIVE,
        }
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    // --- Queries ---

    pub async fn posts(&self) -> Result<Vec<Post>> {
        self.storage.list_posts().await
    }

    pub async fn post(&self, id: &str) -> Result<Post> {
        self.storage.get_post(&PostId::from(id)).await
    }

    // --- Mutations ---

    pub async fn create_post(&self, title: &str, content: &str, comments_enabled: bool) -> Result<Post> {
        self.storage.create_post(title, content, comments_enabled).await
    }

    pub async fn create_comment(
        &self,
        post_id: &str,
        parent_id: Option<&str>,
        content: &str,
    ) -> Result<Comment> {
        let parent_id = parent_id.map(CommentId::from);
        self.storage
            .create_comment(&PostId::from(post_id), parent_id.as_ref(), content)
            .await
    }

    // --- Subscriptions ---

    /// Live feed of comments added to `post_id`.
    pub async fn comment_added(&self, post_id: &str) -> Result<CommentFeed> {
        let handle = self.storage.subscribe(&PostId::from(post_id)).await?;
        debug!(post_id = %post_id, subscription_id = %handle.id, "Comment feed opened");
        Ok(CommentFeed {
            handle,
            keep_alive: self.keep_alive,
        })
    }

    /// Close a feed opened by [`Resolver::comment_added`].
    pub fn close_feed(&self, feed: CommentFeed) -> bool {
        self.storage.unsubscribe(feed.handle.id)
    }
}

/// Item yielded by a [`CommentFeed`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedItem {
    Comment(Comment),
    /// Nothing arrived within the keep-alive interval; the transport should
    /// ping its peer.
    KeepAlive,
}

/// A subscription feed with keep-alive ticks.
#[derive(Debug)]
pub struct CommentFeed {
    handle: SubscriptionHandle,
    keep_alive: Duration,
}

impl CommentFeed {
    pub fn id(&self) -> SubscriptionId {
        self.handle.id
    }

    /// Wait until a comment arrives or the keep-alive interval passes.
    ///
    /// Returns `None` once the subscription has closed. Dropping the feed
    /// releases its subscription.
    pub async fn next(&mut self) -> Option<FeedItem> {
        match tokio::time::timeout(self.keep_alive, self.handle.recv()).await {
            Ok(Some(SubscriptionEvent::Comment { comment })) => Some(FeedItem::Comment(comment)),
            Ok(Some(SubscriptionEvent::Dropped { .. })) | Ok(None) => None,
            Err(_) => Some(FeedItem::KeepAlive),
        }
    }

    pub fn into_handle(self) -> SubscriptionHandle {
        self.handle
    }
}
