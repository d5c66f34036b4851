//! Relational store on Postgres.
//!
//! Posts and comments are flat rows. Reads rebuild comment trees from
//! `parent_id` links in `seq` order, the same way the in-memory store does,
//! so orphans are excluded identically. Each statement auto-commits.
//! Notifications always go through the relay.

use crate::error::{Result, StoreError};
use crate::relay::{Relay, RelayFanout};
use crate::store::Storage;
use crate::subscriptions::{
    NotifyStats, NotifyStatsSnapshot, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
};
use crate::tree::CommentTree;
use crate::types::{Comment, CommentId, Post, PostId};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, FromRow)]
struct PostRow {
    id: String,
    title: String,
    content: String,
    comments_enabled: bool,
}

impl PostRow {
    fn into_post(self, comments: Vec<Comment>) -> Post {
        Post {
            id: PostId(self.id),
            title: self.title,
            content: self.content,
            comments_enabled: self.comments_enabled,
            comments,
        }
    }
}

#[derive(Debug, FromRow)]
struct CommentRow {
    id: String,
    post_id: String,
    parent_id: Option<String>,
    content: String,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: CommentId(row.id),
            post_id: PostId(row.post_id),
            parent_id: row.parent_id.map(CommentId),
            content: row.content,
            children: Vec::new(),
        }
    }
}

/// Posts and comments in Postgres, notifications through a relay.
pub struct PostgresStore {
    pool: PgPool,
    fanout: RelayFanout,
    stats: Arc<NotifyStats>,
}

impl PostgresStore {
    pub fn new(pool: PgPool, relay: Arc<dyn Relay>, config: SubscriptionConfig) -> Self {
        let stats = Arc::new(NotifyStats::new());
        Self {
            pool,
            fanout: RelayFanout::new(relay, config, Arc::clone(&stats)),
            stats,
        }
    }

    pub async fn connect(
        url: &str,
        max_connections: u32,
        relay: Arc<dyn Relay>,
        config: SubscriptionConfig,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        info!(max_connections, "Connected to postgres");
        Ok(Self::new(pool, relay, config))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Running relay listeners.
    pub fn subscription_count(&self) -> usize {
        self.fanout.listener_count()
    }

    async fn comments_of(&self, post_id: &PostId) -> Result<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            "SELECT id, post_id, parent_id, content FROM comments WHERE post_id = $1 ORDER BY seq",
        )
        .bind(post_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }
}

#[async_trait]
impl Storage for PostgresStore {
    async fn list_posts(&self) -> Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, PostRow>(
            "SELECT id, title, content, comments_enabled FROM posts ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, CommentRow>(
            "SELECT id, post_id, parent_id, content FROM comments ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_post: HashMap<PostId, Vec<Comment>> = HashMap::new();
        for row in rows {
            let comment = Comment::from(row);
            by_post.entry(comment.post_id.clone()).or_default().push(comment);
        }

        Ok(posts
            .into_iter()
            .map(|row| {
                let comments = by_post.remove(&PostId(row.id.clone())).unwrap_or_default();
                row.into_post(CommentTree::from_flat(comments).roots())
            })
            .collect())
    }

    async fn get_post(&self, id: &PostId) -> Result<Post> {
        let row = sqlx::query_as::<_, PostRow>(
            "SELECT id, title, content, comments_enabled FROM posts WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::PostNotFound(id.clone()))?;

        let comments = self.comments_of(id).await?;
        Ok(row.into_post(CommentTree::from_flat(comments).roots()))
    }

    async fn get_comment(&self, id: &CommentId) -> Result<Comment> {
        let row = sqlx::query_as::<_, CommentRow>(
            "SELECT id, post_id, parent_id, content FROM comments WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::CommentNotFound(id.clone()))?;

        let comment = Comment::from(row);
        let tree = CommentTree::from_flat(self.comments_of(&comment.post_id).await?);
        Ok(tree.subtree(id).unwrap_or(comment))
    }

    async fn create_post(&self, title: &str, content: &str, comments_enabled: bool) -> Result<Post> {
        let id = PostId::generate();
        sqlx::query("INSERT INTO posts (id, title, content, comments_enabled) VALUES ($1, $2, $3, $4)")
            .bind(id.as_str())
            .bind(title)
            .bind(content)
            .bind(comments_enabled)
            .execute(&self.pool)
            .await?;

        debug!(post_id = %id, comments_enabled, "Post created");

        Ok(Post {
            id,
            title: title.to_string(),
            content: content.to_string(),
            comments_enabled,
            comments: Vec::new(),
        })
    }

    async fn create_comment(
        &self,
        post_id: &PostId,
        parent_id: Option<&CommentId>,
        content: &str,
    ) -> Result<Comment> {
        let enabled = sqlx::query_scalar::<_, bool>("SELECT comments_enabled FROM posts WHERE id = $1")
            .bind(post_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match enabled {
            None => {
                return Err(StoreError::InvalidOperation(format!(
                    "cannot add comment: post {} does not exist",
                    post_id
                )))
            }
            Some(false) => {
                return Err(StoreError::InvalidOperation(format!(
                    "cannot add comment: comments are disabled for post {}",
                    post_id
                )))
            }
            Some(true) => {}
        }

        if let Some(parent) = parent_id {
            let resolved = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM comments WHERE id = $1 AND post_id = $2)",
            )
            .bind(parent.as_str())
            .bind(post_id.as_str())
            .fetch_one(&self.pool)
            .await?;
            if !resolved {
                debug!(post_id = %post_id, parent_id = %parent, "Parent not found, comment will be orphaned");
            }
        }

        let comment = Comment::new(post_id.clone(), parent_id.cloned(), content);
        sqlx::query("INSERT INTO comments (id, post_id, parent_id, content) VALUES ($1, $2, $3, $4)")
            .bind(comment.id.as_str())
            .bind(post_id.as_str())
            .bind(parent_id.map(CommentId::as_str))
            .bind(content)
            .execute(&self.pool)
            .await?;

        debug!(post_id = %post_id, comment_id = %comment.id, "Comment created");

        self.fanout.publish(post_id, &comment).await;
        Ok(comment)
    }

    async fn subscribe(&self, post_id: &PostId) -> Result<SubscriptionHandle> {
        self.fanout.subscribe(post_id).await
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.fanout.unsubscribe(id)
    }

    async fn notify(&self, post_id: &PostId, comment: &Comment) {
        self.fanout.publish(post_id, comment).await;
    }

    fn stats(&self) -> NotifyStatsSnapshot {
        self.stats.snapshot()
    }
}
