//! Typing indicators.
//!
//! Typing state is broadcast directly to the room; the Redis hash only
//! exists so a crashed client's indicator dies with the key's TTL
//! instead of sticking forever.

use crate::error::AppResult;
use crate::keys;
use crate::redis_client::RedisClient;
use redis::AsyncCommands;

/// Stale typing state expires after this many seconds.
pub const TYPING_TTL_SECS: i64 = 10;

pub struct TypingService;

impl TypingService {
    pub async fn start(
        redis: &RedisClient,
        room: &str,
        identifier: &str,
        display_name: &str,
    ) -> AppResult<()> {
        let mut conn = redis.connection().await;
        let key = keys::typing(room);
        let _: () = conn.hset(&key, identifier, display_name).await?;
        let _: () = conn.expire(&key, TYPING_TTL_SECS).await?;
        Ok(())
    }

    pub async fn stop(redis: &RedisClient, room: &str, identifier: &str) -> AppResult<()> {
        let mut conn = redis.connection().await;
        let _: () = conn.hdel(keys::typing(room), identifier).await?;
        Ok(())
    }
}
