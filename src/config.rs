//! Store configuration and backend selection.

use crate::error::{Result, StoreError};
use crate::subscriptions::{OverflowPolicy, SubscriptionConfig};
use serde::Deserialize;

/// Default Postgres pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Store configuration.
#[derive(Clone, Debug, Default)]
pub struct StoreConfig {
    /// Which backend to build.
    pub backend: BackendConfig,

    /// Queue sizing and overflow policy for every subscription.
    pub subscription: SubscriptionConfig,
}

/// Storage backend selection.
#[derive(Clone, Debug)]
pub enum BackendConfig {
    /// Volatile in-process store.
    Memory { notify: NotifyStrategy },

    /// Relational store. Always notifies through a relay.
    Postgres {
        url: String,
        max_connections: u32,
        relay: RelayConfig,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Memory {
            notify: NotifyStrategy::Direct,
        }
    }
}

/// How the in-memory store notifies subscribers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum NotifyStrategy {
    /// Hand comments straight to local subscriber queues.
    #[default]
    Direct,
    /// Publish through a relay so other processes see them too.
    Relay(RelayConfig),
}

/// Which relay to connect to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayConfig {
    /// Redis pub/sub at `host:port` or a `redis://` URL.
    Redis { addr: String },
    /// In-process relay; only spans the current process.
    Local,
}

/// `STORAGE_TYPE` values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    #[default]
    #[serde(alias = "in_memory", alias = "inmemory")]
    Memory,
    Postgres,
}

/// Raw settings as read from the environment.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EnvSettings {
    #[serde(default)]
    pub storage_type: StorageType,
    pub redis_addr: Option<String>,
    pub database_url: Option<String>,
    pub database_max_connections: Option<u32>,
    pub subscription_buffer_size: Option<usize>,
    pub subscription_overflow: Option<OverflowPolicy>,
}

impl StoreConfig {
    /// Read configuration from environment variables.
    ///
    /// See [`EnvSettings`] for the recognized variables (upper-cased).
    pub fn from_env() -> Result<Self> {
        let settings: EnvSettings = envy::from_env()?;
        Self::from_settings(settings)
    }

    /// Build configuration from already-parsed settings.
    pub fn from_settings(settings: EnvSettings) -> Result<Self> {
        let redis_addr = non_empty(settings.redis_addr);

        let backend = match settings.storage_type {
            StorageType::Memory => BackendConfig::Memory {
                notify: match redis_addr {
                    Some(addr) => NotifyStrategy::Relay(RelayConfig::Redis { addr }),
                    None => NotifyStrategy::Direct,
                },
            },
            StorageType::Postgres => {
                let url = non_empty(settings.database_url).ok_or_else(|| {
                    StoreError::Config("DATABASE_URL is required for postgres storage".to_string())
                })?;
                let addr = redis_addr.ok_or_else(|| {
                    StoreError::Config("REDIS_ADDR is required for postgres storage".to_string())
                })?;
                BackendConfig::Postgres {
                    url,
                    max_connections: settings
                        .database_max_connections
                        .unwrap_or(DEFAULT_MAX_CONNECTIONS),
                    relay: RelayConfig::Redis { addr },
                }
            }
        };

        let mut subscription = SubscriptionConfig::default();
        if let Some(size) = settings.subscription_buffer_size {
            subscription.buffer_size = size;
        }
        if let Some(overflow) = settings.subscription_overflow {
            subscription.overflow = overflow;
        }

        Ok(Self {
            backend,
            subscription,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(vars: &[(&str, &str)]) -> Result<StoreConfig> {
        let settings: EnvSettings = envy::from_iter(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )?;
        StoreConfig::from_settings(settings)
    }

    #[test]
    fn test_defaults_to_direct_memory() {
        let config = parse(&[]).unwrap();
        assert!(matches!(
            config.backend,
            BackendConfig::Memory {
                notify: NotifyStrategy::Direct
            }
        ));
        assert_eq!(config.subscription.buffer_size, 1000);
        assert_eq!(config.subscription.overflow, OverflowPolicy::Disconnect);
    }

    #[test]
    fn test_memory_with_redis_uses_relay() {
        let config = parse(&[("redis_addr", "localhost:6379")]).unwrap();
        match config.backend {
            BackendConfig::Memory { notify } => assert_eq!(
                notify,
                NotifyStrategy::Relay(RelayConfig::Redis {
                    addr: "localhost:6379".to_string()
                })
            ),
            other => panic!("Expected memory backend, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_redis_addr_ignored() {
        let config = parse(&[("redis_addr", "  ")]).unwrap();
        assert!(matches!(
            config.backend,
            BackendConfig::Memory {
                notify: NotifyStrategy::Direct
            }
        ));
    }

    #[test]
    fn test_postgres() {
        let config = parse(&[
            ("storage_type", "postgres"),
            ("database_url", "postgres://localhost/blog"),
            ("redis_addr", "localhost:6379"),
            ("database_max_connections", "12"),
        ])
        .unwrap();

        match config.backend {
            BackendConfig::Postgres {
                url,
                max_connections,
                relay,
            } => {
                assert_eq!(url, "postgres://localhost/blog");
                assert_eq!(max_connections, 12);
                assert_eq!(
                    relay,
                    RelayConfig::Redis {
                        addr: "localhost:6379".to_string()
                    }
                );
            }
            other => panic!("Expected postgres backend, got {:?}", other),
        }
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let result = parse(&[("storage_type", "postgres"), ("redis_addr", "localhost:6379")]);
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[test]
    fn test_postgres_requires_relay() {
        let result = parse(&[
            ("storage_type", "postgres"),
            ("database_url", "postgres://localhost/blog"),
        ]);
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[test]
    fn test_unknown_storage_type_rejected() {
        let result = parse(&[("storage_type", "cassandra")]);
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[test]
    fn test_subscription_settings() {
        let config = parse(&[
            ("subscription_buffer_size", "16"),
            ("subscription_overflow", "drop_newest"),
        ])
        .unwrap();
        assert_eq!(config.subscription.buffer_size, 16);
        assert_eq!(config.subscription.overflow, OverflowPolicy::DropNewest);
    }
}
