//! Broadcast relay for cross-process comment fan-out.
//!
//! Every comment created under a post is published as JSON on the topic
//! `post:<postId>:comments`. Each relay-backed subscription holds its own
//! topic subscription and forwards decoded comments onto its handle's queue.
//!
//! ```text
//! Process A: create_comment ──► PUBLISH post:42:comments {"id": ...}
//!                                   │
//!                              relay (Redis)
//!                                   │
//! Process B: listener task ◄────────┘ ──► SubscriptionHandle
//! ```

mod fanout;
mod local;
mod redis_relay;

pub use self::fanout::RelayFanout;
pub use self::local::LocalRelay;
pub use self::redis_relay::RedisRelay;

use crate::config::RelayConfig;
use crate::error::Result;
use crate::types::PostId;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::sync::Arc;

/// A publish/subscribe bus keyed by topic.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Publish a payload to every current subscriber of `topic`.
    async fn publish(&self, topic: &str, payload: String) -> Result<()>;

    /// Subscribe to `topic`.
    ///
    /// The subscription is active once this returns: anything published
    /// afterwards is yielded by the stream.
    async fn subscribe(&self, topic: &str) -> Result<BoxStream<'static, String>>;
}

/// Relay topic carrying new comments of a post.
pub fn topic_for_post(post_id: &PostId) -> String {
    format!("post:{}:comments", post_id)
}

/// Build the relay described by `config`.
pub async fn connect_relay(config: &RelayConfig) -> Result<Arc<dyn Relay>> {
    match config {
        RelayConfig::Redis { addr } => Ok(Arc::new(RedisRelay::connect(addr).await?)),
        RelayConfig::Local => Ok(Arc::new(LocalRelay::new())),
    }
}
