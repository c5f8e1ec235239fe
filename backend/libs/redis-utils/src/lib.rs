use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::{Client, ConnectionInfo, IntoConnectionInfo};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Shared Redis connection manager guarded by a Tokio mutex.
///
/// The `ConnectionManager` reconnects on its own; the mutex only guards the
/// handle so that services can clone a live connection out of it.
pub type SharedConnectionManager = Arc<Mutex<ConnectionManager>>;

/// Redis connection pool used by every service that talks to the
/// ephemeral store (presence, unread counters, typing, message cache).
pub struct RedisPool {
    manager: SharedConnectionManager,
}

impl RedisPool {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let info: ConnectionInfo = redis_url
            .into_connection_info()
            .context("failed to parse REDIS_URL connection string")?;

        let client = Client::open(info).context("failed to construct Redis client")?;
        let connection_manager = ConnectionManager::new(client)
            .await
            .context("failed to initialize Redis connection manager")?;

        info!("Redis connection manager established");

        Ok(Self {
            manager: Arc::new(Mutex::new(connection_manager)),
        })
    }

    pub fn manager(&self) -> SharedConnectionManager {
        self.manager.clone()
    }
}
