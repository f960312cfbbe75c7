use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::errors::StoreError;
use crate::store::PolicyStore;

/// Policy store backed by a shared Redis deployment. Only `GET` is issued.
#[derive(Clone)]
pub struct RedisPolicyStore {
    manager: ConnectionManager,
}

impl RedisPolicyStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|err| StoreError::Unavailable(format!("redis client: {err}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|err| StoreError::Unavailable(format!("redis connect: {err}")))?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl PolicyStore for RedisPolicyStore {
    async fn get(&self, key: &str) -> Result<String, StoreError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|err| StoreError::Backend(format!("redis get: {err}")))?;
        value.ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}
