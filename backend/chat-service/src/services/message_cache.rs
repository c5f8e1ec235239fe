//! Redis-backed recent-message cache.
//!
//! Each stream keeps a short list of serialized messages, newest first,
//! under a `cache:messages:*` key with a short expiry. The cache is
//! strictly an accelerator: every operation degrades to the durable
//! store on miss or error, so failures here are logged and swallowed
//! rather than surfaced to the client.

use crate::models::{Message, MessageFilter};
use crate::redis_client::RedisClient;
use redis::AsyncCommands;

/// At most this many messages are cached per stream.
pub const CACHE_LIMIT: isize = 50;
/// Cache entries expire after five minutes.
pub const CACHE_TTL_SECS: i64 = 300;

pub struct MessageCache;

impl MessageCache {
    /// Cached history for a stream, newest first. `None` means miss;
    /// unparseable entries also count as a miss so a schema change never
    /// serves stale shapes.
    pub async fn get(redis: &RedisClient, filter: &MessageFilter) -> Option<Vec<Message>> {
        let key = filter.cache_key();
        let mut conn = redis.connection().await;
        let raw: Vec<String> = match conn.lrange(&key, 0, -1).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(%key, error = %e, "message cache read failed");
                return None;
            }
        };
        if raw.is_empty() {
            return None;
        }

        let mut messages = Vec::with_capacity(raw.len());
        for entry in &raw {
            match serde_json::from_str::<Message>(entry) {
                Ok(message) => messages.push(message),
                Err(e) => {
                    tracing::warn!(%key, error = %e, "dropping unparseable cache entry");
                    let _: Result<(), _> = conn.del(&key).await;
                    return None;
                }
            }
        }
        Some(messages)
    }

    /// Replace a stream's cache with a freshly fetched page.
    pub async fn fill(redis: &RedisClient, filter: &MessageFilter, messages: &[Message]) {
        let key = filter.cache_key();
        let serialized: Vec<String> = messages
            .iter()
            .filter_map(|m| serde_json::to_string(m).ok())
            .collect();
        if serialized.is_empty() {
            return;
        }

        let mut conn = redis.connection().await;
        let result: Result<(), redis::RedisError> = async {
            let _: () = conn.del(&key).await?;
            let _: () = conn.rpush(&key, serialized).await?;
            let _: () = conn.expire(&key, CACHE_TTL_SECS).await?;
            Ok(())
        }
        .await;
        if let Err(e) = result {
            tracing::warn!(%key, error = %e, "message cache fill failed");
        }
    }

    /// Prepend a newly appended message, trimming to the cache bound.
    /// No-op when the stream has no cache yet; history fetch will fill it.
    pub async fn prepend(redis: &RedisClient, message: &Message) {
        let Some(filter) = message.filter() else {
            return;
        };
        let key = filter.cache_key();
        let Ok(serialized) = serde_json::to_string(message) else {
            return;
        };

        let mut conn = redis.connection().await;
        let result: Result<(), redis::RedisError> = async {
            let exists: bool = conn.exists(&key).await?;
            if !exists {
                return Ok(());
            }
            let _: () = conn.lpush(&key, serialized).await?;
            let _: () = conn.ltrim(&key, 0, CACHE_LIMIT - 1).await?;
            let _: () = conn.expire(&key, CACHE_TTL_SECS).await?;
            Ok(())
        }
        .await;
        if let Err(e) = result {
            tracing::warn!(%key, error = %e, "message cache prepend failed");
        }
    }

    /// Rewrite a cached message in place after an edit, reaction or seen
    /// update. Position in the list is unchanged.
    pub async fn rewrite(redis: &RedisClient, message: &Message) {
        let Some(filter) = message.filter() else {
            return;
        };
        let key = filter.cache_key();
        let Ok(serialized) = serde_json::to_string(message) else {
            return;
        };

        let mut conn = redis.connection().await;
        let result: Result<(), redis::RedisError> = async {
            let raw: Vec<String> = conn.lrange(&key, 0, -1).await?;
            for (index, entry) in raw.iter().enumerate() {
                let cached: Option<Message> = serde_json::from_str(entry).ok();
                if cached.map(|m| m.id) == Some(message.id) {
                    let _: () = conn.lset(&key, index as isize, serialized).await?;
                    break;
                }
            }
            Ok(())
        }
        .await;
        if let Err(e) = result {
            tracing::warn!(%key, error = %e, "message cache rewrite failed");
        }
    }
}
