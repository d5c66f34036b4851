//! Volatile in-process store.

use crate::error::{Result, StoreError};
use crate::relay::{Relay, RelayFanout};
use crate::store::Storage;
use crate::subscriptions::{
    NotifyStats, NotifyStatsSnapshot, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
    SubscriptionManager,
};
use crate::tree::CommentTree;
use crate::types::{Comment, CommentId, Post, PostId};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Stored post without its materialized tree.
struct PostRecord {
    id: PostId,
    title: String,
    content: String,
    comments_enabled: bool,
    /// Every comment of this post, orphans included, in creation order.
    comment_ids: Vec<CommentId>,
}

#[derive(Default)]
struct State {
    posts: HashMap<PostId, PostRecord>,
    comments: HashMap<CommentId, Comment>,
}

impl State {
    fn tree_for(&self, post: &PostRecord) -> CommentTree {
        CommentTree::from_flat(
            post.comment_ids
                .iter()
                .filter_map(|id| self.comments.get(id).cloned()),
        )
    }

    fn materialize(&self, post: &PostRecord) -> Post {
        Post {
            id: post.id.clone(),
            title: post.title.clone(),
            content: post.content.clone(),
            comments_enabled: post.comments_enabled,
            comments: self.tree_for(post).roots(),
        }
    }
}

enum Notifier {
    Direct(SubscriptionManager),
    Relay(RelayFanout),
}

/// Posts and comments held in process memory.
///
/// One reader/writer lock guards all posts and comments. Reads share it;
/// post creation, comment creation, and direct subscription registration
/// take it exclusively. With direct fan-out, `create_comment` delivers while
/// still holding the exclusive lock, so every subscriber of a post sees its
/// comments in the order they were stored.
pub struct MemoryStore {
    state: RwLock<State>,
    notifier: Notifier,
    stats: Arc<NotifyStats>,
}

impl MemoryStore {
    /// Store with direct, in-process fan-out.
    pub fn new(config: SubscriptionConfig) -> Self {
        let stats = Arc::new(NotifyStats::new());
        Self {
            state: RwLock::new(State::default()),
            notifier: Notifier::Direct(SubscriptionManager::new(config, Arc::clone(&stats))),
            stats,
        }
    }

    /// Store that notifies through `relay`.
    pub fn with_relay(relay: Arc<dyn Relay>, config: SubscriptionConfig) -> Self {
        let stats = Arc::new(NotifyStats::new());
        Self {
            state: RwLock::new(State::default()),
            notifier: Notifier::Relay(RelayFanout::new(relay, config, Arc::clone(&stats))),
            stats,
        }
    }

    /// Live subscriptions held by this store.
    pub fn subscription_count(&self) -> usize {
        match &self.notifier {
            Notifier::Direct(manager) => manager.subscription_count(),
            Notifier::Relay(fanout) => fanout.listener_count(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(SubscriptionConfig::default())
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn list_posts(&self) -> Result<Vec<Post>> {
        let state = self.state.read();
        Ok(state.posts.values().map(|p| state.materialize(p)).collect())
    }

    async fn get_post(&self, id: &PostId) -> Result<Post> {
        let state = self.state.read();
        let post = state
            .posts
            .get(id)
            .ok_or_else(|| StoreError::PostNotFound(id.clone()))?;
        Ok(state.materialize(post))
    }

    async fn get_comment(&self, id: &CommentId) -> Result<Comment> {
        let state = self.state.read();
        let comment = state
            .comments
            .get(id)
            .ok_or_else(|| StoreError::CommentNotFound(id.clone()))?;

        let subtree = state
            .posts
            .get(&comment.post_id)
            .and_then(|post| state.tree_for(post).subtree(id));
        Ok(subtree.unwrap_or_else(|| comment.clone()))
    }

    async fn create_post(&self, title: &str, content: &str, comments_enabled: bool) -> Result<Post> {
        let mut state = self.state.write();

        let record = PostRecord {
            id: PostId::generate(),
            title: title.to_string(),
            content: content.to_string(),
            comments_enabled,
            comment_ids: Vec::new(),
        };
        let post = state.materialize(&record);
        state.posts.insert(record.id.clone(), record);

        debug!(post_id = %post.id, comments_enabled, "Post created");
        Ok(post)
    }

    async fn create_comment(
        &self,
        post_id: &PostId,
        parent_id: Option<&CommentId>,
        content: &str,
    ) -> Result<Comment> {
        let comment = {
            let mut state = self.state.write();

            match state.posts.get(post_id) {
                None => {
                    return Err(StoreError::InvalidOperation(format!(
                        "cannot add comment: post {} does not exist",
                        post_id
                    )))
                }
                Some(post) if !post.comments_enabled => {
                    return Err(StoreError::InvalidOperation(format!(
                        "cannot add comment: comments are disabled for post {}",
                        post_id
                    )))
                }
                Some(_) => {}
            }

            if let Some(parent) = parent_id {
                let resolved = state
                    .comments
                    .get(parent)
                    .is_some_and(|p| p.post_id == *post_id);
                if !resolved {
                    debug!(post_id = %post_id, parent_id = %parent, "Parent not found, comment will be orphaned");
                }
            }

            let comment = Comment::new(post_id.clone(), parent_id.cloned(), content);
            state.comments.insert(comment.id.clone(), comment.clone());
            if let Some(post) = state.posts.get_mut(post_id) {
                post.comment_ids.push(comment.id.clone());
            }

            debug!(post_id = %post_id, comment_id = %comment.id, "Comment created");

            if let Notifier::Direct(manager) = &self.notifier {
                manager.broadcast(post_id, &comment);
            }
            comment
        };

        if let Notifier::Relay(fanout) = &self.notifier {
            fanout.publish(post_id, &comment).await;
        }

        Ok(comment)
    }

    async fn subscribe(&self, post_id: &PostId) -> Result<SubscriptionHandle> {
        match &self.notifier {
            Notifier::Direct(manager) => {
                let _state = self.state.write();
                Ok(manager.subscribe(post_id))
            }
            Notifier::Relay(fanout) => fanout.subscribe(post_id).await,
        }
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match &self.notifier {
            Notifier::Direct(manager) => manager.unsubscribe(id),
            Notifier::Relay(fanout) => fanout.unsubscribe(id),
        }
    }

    async fn notify(&self, post_id: &PostId, comment: &Comment) {
        match &self.notifier {
            Notifier::Direct(manager) => {
                let _state = self.state.read();
                manager.broadcast(post_id, comment);
            }
            Notifier::Relay(fanout) => {
                fanout.publish(post_id, comment).await;
            }
        }
    }

    fn stats(&self) -> NotifyStatsSnapshot {
        self.stats.snapshot()
    }
}
