//! # Commentary
//!
//! Posts, nested comments, and live per-post comment subscriptions over
//! pluggable storage.
//!
//! ## Core Concepts
//!
//! - **Posts**: top-level content that may allow or forbid comments
//! - **Comments**: replies to a post, optionally nested under another comment
//! - **Subscriptions**: live feeds of comments created under one post
//! - **Relay**: a publish/subscribe bus that carries notifications between
//!   processes
//!
//! Two backends implement [`Storage`]: [`MemoryStore`] (volatile, with either
//! direct in-process fan-out or relay fan-out) and [`PostgresStore`] (always
//! relay fan-out).
//!
//! ## Example
//!
//! ```ignore
//! use commentary::{open, StoreConfig};
//!
//! let store = open(StoreConfig::default()).await?;
//!
//! let post = store.create_post("Hello", "First post", true).await?;
//! let mut feed = store.subscribe(&post.id).await?;
//!
//! store.create_comment(&post.id, None, "hi").await?;
//! let event = feed.recv().await;
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod relay;
pub mod resolver;
pub mod store;
pub mod subscriptions;
pub mod tree;
pub mod types;

// Re-exports
pub use config::{BackendConfig, EnvSettings, NotifyStrategy, RelayConfig, StorageType, StoreConfig};
pub use error::{ErrorKind, Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use relay::{connect_relay, topic_for_post, LocalRelay, RedisRelay, Relay, RelayFanout};
pub use resolver::{CommentFeed, FeedItem, Resolver, DEFAULT_KEEP_ALIVE};
pub use store::{open, Storage};
pub use subscriptions::{
    DropReason, NotifyStats, NotifyStatsSnapshot, OverflowPolicy, SubscriptionConfig,
    SubscriptionEvent, SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
pub use tree::CommentTree;
pub use types::*;
