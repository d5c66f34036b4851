//! Per-post registry for direct, in-process comment fan-out.

use crate::types::{Comment, PostId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{channel, Sender};
use tracing::{debug, warn};

use super::stats::NotifyStats;
use super::types::{
    DropReason, OverflowPolicy, Release, SubscriptionConfig, SubscriptionEvent,
    SubscriptionHandle, SubscriptionId,
};

/// Internal subscription state.
struct Subscription {
    sender: Sender<SubscriptionEvent>,
}

/// Live endpoints, grouped by post.
type Registry = RwLock<HashMap<PostId, HashMap<SubscriptionId, Subscription>>>;

/// Outcome of one delivery attempt.
enum Delivery {
    Sent,
    /// Queue full; the comment was discarded for this subscriber.
    Skipped,
    /// Subscriber must be removed.
    Remove(DropReason),
    /// Receiver is gone.
    Abandoned,
}

impl Subscription {
    fn deliver(&self, comment: &Comment, policy: OverflowPolicy) -> Delivery {
        let event = SubscriptionEvent::Comment {
            comment: comment.clone(),
        };
        match self.sender.try_send(event) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => match policy {
                OverflowPolicy::DropNewest => Delivery::Skipped,
                OverflowPolicy::Disconnect => Delivery::Remove(DropReason::BufferOverflow),
            },
            Err(TrySendError::Closed(_)) => Delivery::Abandoned,
        }
    }
}

/// Removes one direct endpoint when its handle is dropped.
pub(crate) struct EndpointGuard {
    registry: Weak<Registry>,
    post_id: PostId,
    id: SubscriptionId,
}

impl Drop for EndpointGuard {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        if remove_endpoint(&registry, &self.post_id, self.id).is_some() {
            debug!(post_id = %self.post_id, subscription_id = %self.id, "Dropped subscription released");
        }
    }
}

/// Take `id` out of `post_id`'s endpoints, dropping the post entry once empty.
fn remove_endpoint(registry: &Registry, post_id: &PostId, id: SubscriptionId) -> Option<Subscription> {
    let mut subs = registry.write();
    let endpoints = subs.get_mut(post_id)?;
    let removed = endpoints.remove(&id);
    if endpoints.is_empty() {
        subs.remove(post_id);
    }
    removed
}

/// Manages direct subscriptions and delivers comments to them.
///
/// Delivery is a non-blocking hand-off onto each subscriber's bounded queue,
/// so a stalled consumer never stalls the writer.
pub struct SubscriptionManager {
    subscriptions: Arc<Registry>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    config: SubscriptionConfig,
    stats: Arc<NotifyStats>,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    pub fn new(config: SubscriptionConfig, stats: Arc<NotifyStats>) -> Self {
        Self {
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            config,
            stats,
        }
    }

    /// Register a new endpoint for `post_id`.
    ///
    /// Only comments delivered after this call are received; there is no
    /// replay. The endpoint is released when the handle is dropped.
    pub fn subscribe(&self, post_id: &PostId) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = channel(self.config.capacity());

        self.subscriptions
            .write()
            .entry(post_id.clone())
            .or_default()
            .insert(id, Subscription { sender });

        debug!(post_id = %post_id, subscription_id = %id, "Direct subscription registered");

        let guard = EndpointGuard {
            registry: Arc::downgrade(&self.subscriptions),
            post_id: post_id.clone(),
            id,
        };
        SubscriptionHandle::new(id, post_id.clone(), receiver, Release::Endpoint(guard))
    }

    /// Unsubscribe and clean up. Returns false if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let post_id = {
            let subs = self.subscriptions.read();
            subs.iter()
                .find(|(_, endpoints)| endpoints.contains_key(&id))
                .map(|(post_id, _)| post_id.clone())
        };
        let Some(post_id) = post_id else {
            return false;
        };
        let Some(sub) = remove_endpoint(&self.subscriptions, &post_id, id) else {
            return false;
        };

        // Best effort; the receiver may already be gone.
        let _ = sub.sender.try_send(SubscriptionEvent::Dropped {
            reason: DropReason::Unsubscribed,
        });

        debug!(post_id = %post_id, subscription_id = %id, "Direct subscription removed");
        true
    }

    /// Total live subscriptions across all posts.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().values().map(HashMap::len).sum()
    }

    /// Live subscriptions for one post.
    pub fn subscriber_count(&self, post_id: &PostId) -> usize {
        self.subscriptions
            .read()
            .get(post_id)
            .map_or(0, HashMap::len)
    }

    /// Deliver a comment to every subscriber of `post_id`.
    ///
    /// Returns the number of subscribers that accepted it. Evicted endpoints
    /// and endpoints whose receiver vanished are removed afterwards.
    pub fn broadcast(&self, post_id: &PostId, comment: &Comment) -> usize {
        let mut delivered = 0;
        let mut to_remove = Vec::new();

        {
            let subs = self.subscriptions.read();
            let Some(endpoints) = subs.get(post_id) else {
                return 0;
            };

            for (id, sub) in endpoints.iter() {
                match sub.deliver(comment, self.config.overflow) {
                    Delivery::Sent => delivered += 1,
                    Delivery::Skipped => {
                        self.stats.record_overflow_drop();
                        debug!(
                            post_id = %post_id,
                            subscription_id = %id,
                            "Subscriber queue full, comment dropped"
                        );
                    }
                    Delivery::Remove(reason) => {
                        self.stats.record_overflow_drop();
                        to_remove.push((*id, Some(reason)));
                    }
                    Delivery::Abandoned => to_remove.push((*id, None)),
                }
            }
        }

        self.stats.record_delivered(delivered as u64);

        for (id, reason) in to_remove {
            let Some(sub) = remove_endpoint(&self.subscriptions, post_id, id) else {
                continue;
            };
            match reason {
                Some(reason) => {
                    self.stats.record_eviction();
                    warn!(
                        post_id = %post_id,
                        subscription_id = %id,
                        "Slow subscriber evicted"
                    );
                    // Try to notify about the drop (queue is likely full)
                    let _ = sub.sender.try_send(SubscriptionEvent::Dropped { reason });
                }
                None => {
                    debug!(post_id = %post_id, subscription_id = %id, "Abandoned subscription pruned");
                }
            }
        }

        delivered
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new(SubscriptionConfig::default(), Arc::new(NotifyStats::new()))
    }
}
