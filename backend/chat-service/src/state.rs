use crate::config::Config;
use crate::redis_client::RedisClient;
use crate::services::blob_store::BlobStore;
use crate::websocket::ConnectionRegistry;
use sqlx::{Pool, Postgres};
use std::sync::Arc;

/// Shared application state handed to every connection.
#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Postgres>,
    pub redis: RedisClient,
    pub registry: ConnectionRegistry,
    pub blob_store: Option<Arc<BlobStore>>,
}

impl AppState {
    pub async fn build(config: &Config, db: Pool<Postgres>, redis: RedisClient) -> Self {
        let blob_store = match &config.s3 {
            Some(s3) => Some(Arc::new(BlobStore::connect(s3).await)),
            None => {
                tracing::warn!("S3_BUCKET not set, attachment uploads disabled");
                None
            }
        };
        Self {
            db,
            redis,
            registry: ConnectionRegistry::new(),
            blob_store,
        }
    }
}
