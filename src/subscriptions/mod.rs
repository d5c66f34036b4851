//! Subscription system for live comment delivery.
//!
//! Subscriptions are scoped to one post and receive every comment created
//! under it, at any depth, from the moment of subscription on. There is no
//! replay.
//!
//! Each subscriber owns a bounded queue. Producers never block: when a queue
//! is full the store's [`OverflowPolicy`] decides whether the comment is
//! discarded for that subscriber or the subscriber is evicted. Dropping a
//! [`SubscriptionHandle`] releases its endpoint.
//!
//! # Example
//!
//! ```ignore
//! let mut handle = store.subscribe(&post.id).await?;
//!
//! while let Some(event) = handle.recv().await {
//!     match event {
//!         SubscriptionEvent::Comment { comment } => println!("Got comment: {:?}", comment),
//!         SubscriptionEvent::Dropped { reason } => break,
//!     }
//! }
//! ```

mod manager;
mod stats;
mod types;

pub use manager::SubscriptionManager;
pub(crate) use types::Release;
pub use stats::{NotifyStats, NotifyStatsSnapshot};
pub use types::{
    DropReason, OverflowPolicy, SubscriptionConfig, SubscriptionEvent, SubscriptionHandle,
    SubscriptionId,
};
