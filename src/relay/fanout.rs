//! Relay-backed comment fan-out.

use super::{topic_for_post, Relay};
use crate::error::Result;
use crate::subscriptions::{
    DropReason, NotifyStats, OverflowPolicy, Release, SubscriptionConfig, SubscriptionEvent,
    SubscriptionHandle, SubscriptionId,
};
use crate::types::{Comment, PostId};
use futures_util::stream::{BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{channel, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

type ListenerRegistry = Arc<Mutex<HashMap<SubscriptionId, CancellationToken>>>;

/// Publishes comments to a relay and turns relay topics back into
/// subscription handles.
///
/// Publish-side failures never reach the caller. They are logged and counted
/// in [`NotifyStats`], and the notification is lost.
pub struct RelayFanout {
    relay: Arc<dyn Relay>,
    config: SubscriptionConfig,
    stats: Arc<NotifyStats>,
    next_id: AtomicU64,
    /// Running listener tasks.
    listeners: ListenerRegistry,
}

impl RelayFanout {
    pub fn new(relay: Arc<dyn Relay>, config: SubscriptionConfig, stats: Arc<NotifyStats>) -> Self {
        Self {
            relay,
            config,
            stats,
            next_id: AtomicU64::new(1),
            listeners: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Publish `comment` on the topic of `post_id`.
    ///
    /// Returns whether the relay accepted it.
    pub async fn publish(&self, post_id: &PostId, comment: &Comment) -> bool {
        let payload = match serde_json::to_string(comment) {
            Ok(payload) => payload,
            Err(e) => {
                self.stats.record_publish_failure();
                warn!(post_id = %post_id, comment_id = %comment.id, error = %e, "Comment notification dropped: encode failed");
                return false;
            }
        };

        let topic = topic_for_post(post_id);
        match self.relay.publish(&topic, payload).await {
            Ok(()) => true,
            Err(e) => {
                self.stats.record_publish_failure();
                warn!(post_id = %post_id, comment_id = %comment.id, error = %e, "Comment notification dropped: relay publish failed");
                false
            }
        }
    }

    /// Subscribe to the topic of `post_id` and start a listener task.
    ///
    /// Must be called within a tokio runtime. The topic subscription is
    /// confirmed before this returns, so no comment published afterwards is
    /// missed.
    pub async fn subscribe(&self, post_id: &PostId) -> Result<SubscriptionHandle> {
        let topic = topic_for_post(post_id);
        let stream = self.relay.subscribe(&topic).await?;

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = channel(self.config.capacity());
        let token = CancellationToken::new();
        let guard = token.clone().drop_guard();

        self.listeners.lock().insert(id, token.clone());

        let listener = Listener {
            id,
            post_id: post_id.clone(),
            sender,
            overflow: self.config.overflow,
            stats: Arc::clone(&self.stats),
            listeners: Arc::clone(&self.listeners),
        };
        tokio::spawn(listener.run(stream, token));

        debug!(post_id = %post_id, subscription_id = %id, topic = %topic, "Relay subscription started");

        Ok(SubscriptionHandle::new(
            id,
            post_id.clone(),
            receiver,
            Release::Listener(guard),
        ))
    }

    /// Stop a listener. Returns false if the id was not running.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.listeners.lock().remove(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Running listener tasks.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

/// Per-subscription task forwarding relay messages to a handle's queue.
struct Listener {
    id: SubscriptionId,
    post_id: PostId,
    sender: Sender<SubscriptionEvent>,
    overflow: OverflowPolicy,
    stats: Arc<NotifyStats>,
    listeners: ListenerRegistry,
}

impl Listener {
    async fn run(self, mut stream: BoxStream<'static, String>, token: CancellationToken) {
        loop {
            let payload = tokio::select! {
                _ = token.cancelled() => {
                    let _ = self.sender.try_send(SubscriptionEvent::Dropped {
                        reason: DropReason::Unsubscribed,
                    });
                    break;
                }
                next = stream.next() => match next {
                    Some(payload) => payload,
                    None => {
                        let _ = self.sender.try_send(SubscriptionEvent::Dropped {
                            reason: DropReason::RelayClosed,
                        });
                        break;
                    }
                },
            };

            let comment: Comment = match serde_json::from_str(&payload) {
                Ok(comment) => comment,
                Err(e) => {
                    self.stats.record_decode_failure();
                    debug!(post_id = %self.post_id, error = %e, "Undecodable relay message dropped");
                    continue;
                }
            };

            match self.sender.try_send(SubscriptionEvent::Comment { comment }) {
                Ok(()) => self.stats.record_delivered(1),
                Err(TrySendError::Full(_)) => {
                    self.stats.record_overflow_drop();
                    if self.overflow == OverflowPolicy::Disconnect {
                        self.stats.record_eviction();
                        warn!(post_id = %self.post_id, subscription_id = %self.id, "Slow subscriber evicted");
                        break;
                    }
                }
                Err(TrySendError::Closed(_)) => break,
            }
        }

        self.listeners.lock().remove(&self.id);
        debug!(post_id = %self.post_id, subscription_id = %self.id, "Relay listener stopped");
    }
}
