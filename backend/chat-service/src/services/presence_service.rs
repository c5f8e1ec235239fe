//! Online/offline state in Redis hashes.
//!
//! One `presence:{identifier}` hash per user: a `status` field plus a
//! `last_seen` unix timestamp recorded on the transition to offline.
//! Every transition is followed by a full snapshot broadcast, so clients
//! can treat `all_users_presence` as authoritative.

use crate::error::AppResult;
use crate::keys;
use crate::redis_client::RedisClient;
use crate::websocket::events::PresenceEntry;
use chrono::Utc;
use redis::AsyncCommands;

pub const STATUS_ONLINE: &str = "online";
pub const STATUS_OFFLINE: &str = "offline";

pub struct PresenceService;

impl PresenceService {
    pub async fn set_online(redis: &RedisClient, identifier: &str) -> AppResult<()> {
        let mut conn = redis.connection().await;
        let key = keys::presence(identifier);
        let _: () = conn.hset(&key, "status", STATUS_ONLINE).await?;
        let _: () = conn.hdel(&key, "last_seen").await?;
        Ok(())
    }

    pub async fn set_offline(redis: &RedisClient, identifier: &str) -> AppResult<()> {
        let mut conn = redis.connection().await;
        let key = keys::presence(identifier);
        let _: () = conn
            .hset_multiple(
                &key,
                &[
                    ("status", STATUS_OFFLINE.to_string()),
                    ("last_seen", Utc::now().timestamp().to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    /// Presence of one user; unknown identifiers read as offline.
    pub async fn get(redis: &RedisClient, identifier: &str) -> AppResult<PresenceEntry> {
        let mut conn = redis.connection().await;
        let key = keys::presence(identifier);
        let status: Option<String> = conn.hget(&key, "status").await?;
        let last_seen: Option<String> = conn.hget(&key, "last_seen").await?;
        Ok(PresenceEntry {
            user_id: identifier.to_string(),
            status: status.unwrap_or_else(|| STATUS_OFFLINE.to_string()),
            last_seen: last_seen.and_then(|s| s.parse().ok()),
        })
    }

    /// Full presence snapshot across all known users.
    pub async fn snapshot(redis: &RedisClient) -> AppResult<Vec<PresenceEntry>> {
        let mut scan_conn = redis.connection().await;
        let keys: Vec<String> = {
            let mut iter = scan_conn
                .scan_match::<_, String>(keys::PRESENCE_SCAN)
                .await?;
            let mut found = Vec::new();
            while let Some(key) = iter.next_item().await {
                found.push(key);
            }
            found
        };

        let mut conn = redis.connection().await;
        let mut entries = Vec::with_capacity(keys.len());
        for key in &keys {
            let Some(identifier) = keys::identifier_from_presence_key(key) else {
                continue;
            };
            let status: Option<String> = conn.hget(key, "status").await?;
            let last_seen: Option<String> = conn.hget(key, "last_seen").await?;
            entries.push(PresenceEntry {
                user_id: identifier.to_string(),
                status: status.unwrap_or_else(|| STATUS_OFFLINE.to_string()),
                last_seen: last_seen.and_then(|s| s.parse().ok()),
            });
        }
        Ok(entries)
    }
}
