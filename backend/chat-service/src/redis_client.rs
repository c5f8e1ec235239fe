use redis::aio::ConnectionManager;
use redis::{Client, RedisResult};
use redis_utils::SharedConnectionManager;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Thin handle over the shared connection manager. Every ephemeral-store
/// service clones a live connection out of this before issuing commands.
#[derive(Clone)]
pub struct RedisClient {
    manager: SharedConnectionManager,
}

impl RedisClient {
    pub fn new(manager: SharedConnectionManager) -> Self {
        Self { manager }
    }

    pub async fn from_url(url: &str) -> RedisResult<Self> {
        let client = Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self {
            manager: Arc::new(Mutex::new(manager)),
        })
    }

    pub async fn connection(&self) -> ConnectionManager {
        let guard = self.manager.lock().await;
        guard.clone()
    }
}
