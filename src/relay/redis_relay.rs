//! Redis pub/sub relay.

use super::Relay;
use crate::error::Result;
use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{debug, info};

/// Relay backed by Redis PUBLISH/SUBSCRIBE.
///
/// Publishing goes through a shared, auto-reconnecting connection. Each
/// subscription needs a dedicated pub/sub connection, which is closed when
/// its stream is dropped.
#[derive(Clone)]
pub struct RedisRelay {
    client: Client,
    publisher: ConnectionManager,
}

impl RedisRelay {
    /// Connect to Redis at `addr` (`host:port` or a `redis://` URL).
    pub async fn connect(addr: &str) -> Result<Self> {
        let url = redis_url(addr);
        let client = Client::open(url.as_str())?;
        let publisher = ConnectionManager::new(client.clone()).await?;

        info!(addr = %addr, "Connected to Redis relay");

        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl Relay for RedisRelay {
    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        let mut conn = self.publisher.clone();
        let receivers: usize = conn.publish(topic, payload).await?;
        debug!(topic = %topic, receivers, "Published to relay");
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<BoxStream<'static, String>> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(topic).await?;

        let stream = pubsub.into_on_message().filter_map(|msg| {
            let payload = match msg.get_payload::<String>() {
                Ok(payload) => Some(payload),
                Err(e) => {
                    debug!(error = %e, "Discarding non-text relay payload");
                    None
                }
            };
            futures_util::future::ready(payload)
        });

        Ok(stream.boxed())
    }
}

/// Accept bare `host:port` addresses as well as full connection URLs.
pub(crate) fn redis_url(addr: &str) -> String {
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("redis://{}", addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_url() {
        assert_eq!(redis_url("localhost:6379"), "redis://localhost:6379");
        assert_eq!(redis_url("redis://cache:6380/2"), "redis://cache:6380/2");
        assert_eq!(redis_url("rediss://secure:6379"), "rediss://secure:6379");
    }
}
