//! Subscription types for live comment delivery.

use super::manager::EndpointGuard;
use crate::types::{Comment, PostId};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::DropGuard;

/// Configuration shared by every subscription of a store.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max queued comments per subscriber.
    /// Default: 1000
    pub buffer_size: usize,

    /// What delivery does when a subscriber's queue is full.
    pub overflow: OverflowPolicy,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            overflow: OverflowPolicy::default(),
        }
    }
}

impl SubscriptionConfig {
    /// Queue capacity actually used; bounded channels need room for at least
    /// one event.
    pub(crate) fn capacity(&self) -> usize {
        self.buffer_size.max(1)
    }
}

/// Policy applied when a subscriber's bounded queue is full.
///
/// Delivery never blocks the notifying writer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Remove the subscriber and close its channel. Already queued comments
    /// can still be drained.
    #[default]
    Disconnect,
    /// Discard the comment for that subscriber only and keep it registered.
    DropNewest,
}

/// Events delivered on a subscription.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubscriptionEvent {
    /// A comment was created under the subscribed post.
    Comment { comment: Comment },

    /// Subscription was closed by the store.
    Dropped { reason: DropReason },
}

/// Why a subscription was closed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
    /// The relay ended the topic stream.
    RelayClosed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Releases a subscription's endpoint when its handle goes away.
///
/// The guards are held only for their drop effects.
#[allow(dead_code)]
pub(crate) enum Release {
    /// Cancels a relay listener task.
    Listener(DropGuard),
    /// Removes a direct endpoint from its manager.
    Endpoint(EndpointGuard),
}

/// Handle to a live, per-post comment feed.
///
/// Dropping the handle releases the subscription right away, for direct and
/// relay-backed subscriptions alike.
///
/// Comments are consumed asynchronously with [`recv`](Self::recv),
/// [`next_comment`](Self::next_comment), or as a [`Stream`] of comments.
/// Callers outside any async runtime can use
/// [`blocking_recv`](Self::blocking_recv).
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    pub post_id: PostId,
    receiver: Receiver<SubscriptionEvent>,
    _release: Release,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        id: SubscriptionId,
        post_id: PostId,
        receiver: Receiver<SubscriptionEvent>,
        release: Release,
    ) -> Self {
        Self {
            id,
            post_id,
            receiver,
            _release: release,
        }
    }

    /// Wait for the next event. `None` once the subscription has closed and
    /// its queue is drained.
    pub async fn recv(&mut self) -> Option<SubscriptionEvent> {
        self.receiver.recv().await
    }

    /// Take an event if one is queued.
    pub fn try_recv(&mut self) -> Result<SubscriptionEvent, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block the current thread until the next event.
    ///
    /// Panics if called from within an async runtime; use [`recv`](Self::recv)
    /// there.
    pub fn blocking_recv(&mut self) -> Option<SubscriptionEvent> {
        self.receiver.blocking_recv()
    }

    /// Next comment within `timeout`, or `None` on timeout or close.
    pub async fn next_comment(&mut self, timeout: Duration) -> Option<Comment> {
        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(Some(SubscriptionEvent::Comment { comment })) => Some(comment),
            Ok(Some(SubscriptionEvent::Dropped { .. })) | Ok(None) | Err(_) => None,
        }
    }
}

/// Yields comments until the subscription closes.
impl Stream for SubscriptionHandle {
    type Item = Comment;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Comment>> {
        match ready!(self.receiver.poll_recv(cx)) {
            Some(SubscriptionEvent::Comment { comment }) => Poll::Ready(Some(comment)),
            Some(SubscriptionEvent::Dropped { .. }) | None => Poll::Ready(None),
        }
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("post_id", &self.post_id)
            .finish()
    }
}
