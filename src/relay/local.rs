//! In-process relay over tokio broadcast channels.

use super::Relay;
use crate::error::Result;
use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

/// Default per-topic broadcast capacity.
const DEFAULT_TOPIC_CAPACITY: usize = 1024;

/// A relay that only spans the current process.
///
/// Stores sharing one `LocalRelay` behave like separate server processes
/// sharing one Redis instance. Receivers that fall behind by more than the
/// topic capacity skip the lost messages.
#[derive(Debug)]
pub struct LocalRelay {
    topics: RwLock<HashMap<String, broadcast::Sender<String>>>,
    capacity: usize,
}

impl LocalRelay {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Current receivers on `topic`.
    pub fn receiver_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

impl Default for LocalRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Relay for LocalRelay {
    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        let sender = self.topics.read().get(topic).cloned();
        let Some(sender) = sender else {
            return Ok(());
        };

        if sender.send(payload).is_err() {
            // Nobody listening; forget the topic.
            let mut topics = self.topics.write();
            if topics.get(topic).is_some_and(|s| s.receiver_count() == 0) {
                topics.remove(topic);
            }
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<BoxStream<'static, String>> {
        let receiver = self
            .topics
            .write()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        let topic = topic.to_string();
        let stream = BroadcastStream::new(receiver).filter_map(move |item| {
            let payload = match item {
                Ok(payload) => Some(payload),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(topic = %topic, skipped, "Relay receiver lagged");
                    None
                }
            };
            futures_util::future::ready(payload)
        });

        Ok(stream.boxed())
    }
}
