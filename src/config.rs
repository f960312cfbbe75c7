use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use trafficguard_core_types::ServerName;
use trafficguard_policy_center::{FilePolicyStore, InMemoryPolicyStore, PolicyStore};

/// Process configuration of the `trafficguard` binary.
///
/// Guard behaviour itself (server name, polling, signing) lives in the settings file
/// referenced by `settings_path`, which is layered with `TRAFFIC_GUARD__*` overrides.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub listen: SocketAddr,
    /// Port of the standalone `/metrics` listener; 0 disables it.
    pub metrics_port: u16,
    pub settings_path: Option<PathBuf>,
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            metrics_port: 9090,
            settings_path: None,
            store: StoreConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Process-local store, optionally seeded with a policy document.
    Memory {
        #[serde(default)]
        document: Option<Value>,
    },
    /// One `<key>.json` file per policy key.
    File { dir: PathBuf },
    Redis { url: String },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory { document: None }
    }
}

impl StoreConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreConfig::Memory { .. } => "memory",
            StoreConfig::File { .. } => "file",
            StoreConfig::Redis { .. } => "redis",
        }
    }

    pub async fn build(&self, server_name: &ServerName) -> Result<Arc<dyn PolicyStore>> {
        match self {
            StoreConfig::Memory { document } => {
                let store = InMemoryPolicyStore::new();
                if let Some(document) = document {
                    let raw = serde_json::to_string(document)
                        .context("failed to encode seeded policy document")?;
                    store.put(server_name.interception_key(), raw);
                }
                Ok(Arc::new(store))
            }
            StoreConfig::File { dir } => Ok(Arc::new(FilePolicyStore::new(dir.clone()))),
            StoreConfig::Redis { url } => connect_redis(url).await,
        }
    }
}

#[cfg(feature = "redis")]
async fn connect_redis(url: &str) -> Result<Arc<dyn PolicyStore>> {
    let store = trafficguard_policy_center::redis::RedisPolicyStore::connect(url)
        .await
        .with_context(|| format!("failed to connect to redis at {url}"))?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(_url: &str) -> Result<Arc<dyn PolicyStore>> {
    anyhow::bail!("redis store requested but trafficguard was built without the `redis` feature")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_store_sections() {
        let config: Config = serde_yaml::from_str(
            "listen: 0.0.0.0:9000\nstore:\n  kind: file\n  dir: /var/lib/trafficguard\n",
        )
        .unwrap();
        assert_eq!(config.listen.port(), 9000);
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(
            config.store,
            StoreConfig::File {
                dir: PathBuf::from("/var/lib/trafficguard")
            }
        );
    }

    #[tokio::test]
    async fn memory_store_is_seeded_under_interception_key() {
        let store = StoreConfig::Memory {
            document: Some(serde_json::json!({ "radio": 5, "switch": true })),
        };
        let name = ServerName::parse("checkout").unwrap();
        let built = store.build(&name).await.unwrap();
        let raw = built.get(&name.interception_key()).await.unwrap();
        assert!(raw.contains("\"radio\":5"));
    }

    #[cfg(not(feature = "redis"))]
    #[tokio::test]
    async fn redis_store_requires_feature() {
        let store = StoreConfig::Redis {
            url: "redis://127.0.0.1/".into(),
        };
        let name = ServerName::parse("checkout").unwrap();
        assert!(store.build(&name).await.is_err());
    }
}
