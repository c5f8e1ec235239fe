//! Unread counters and last-message metadata.
//!
//! Every channel and conversation with activity has an `*:info` hash in
//! Redis holding one `unread:{identifier}` counter per user next to
//! `last_message` / `last_message_time` / `last_sender` fields. Counters
//! are incremented for members who are not actively reading the room and
//! reset when the client reports the room read; the hydration summary
//! rebuilds a client's badge state from a key scan.

use crate::error::AppResult;
use crate::keys;
use crate::redis_client::RedisClient;
use crate::websocket::events::UnreadUpdate;
use redis::AsyncCommands;
use std::collections::HashMap;
use uuid::Uuid;

pub struct UnreadService;

impl UnreadService {
    fn counter_field(identifier: &str) -> String {
        format!("unread:{identifier}")
    }

    /// Record a stream's newest message metadata; shown in chat lists
    /// next to the badge.
    pub async fn record_message(
        redis: &RedisClient,
        info_key: &str,
        content: &str,
        sender_id: &str,
        timestamp: &str,
    ) -> AppResult<()> {
        let mut conn = redis.connection().await;
        let _: () = conn
            .hset_multiple(
                info_key,
                &[
                    ("last_message", content),
                    ("last_message_time", timestamp),
                    ("last_sender", sender_id),
                ],
            )
            .await?;
        Ok(())
    }

    /// Bump one user's counter, returning the new value.
    pub async fn increment(
        redis: &RedisClient,
        info_key: &str,
        identifier: &str,
    ) -> AppResult<i64> {
        let mut conn = redis.connection().await;
        Ok(conn
            .hincr(info_key, Self::counter_field(identifier), 1)
            .await?)
    }

    /// Zero one user's counter (room was read).
    pub async fn reset(redis: &RedisClient, info_key: &str, identifier: &str) -> AppResult<()> {
        let mut conn = redis.connection().await;
        let _: () = conn
            .hset(info_key, Self::counter_field(identifier), 0)
            .await?;
        Ok(())
    }

    pub async fn count(redis: &RedisClient, info_key: &str, identifier: &str) -> AppResult<i64> {
        let mut conn = redis.connection().await;
        let count: Option<i64> = conn.hget(info_key, Self::counter_field(identifier)).await?;
        Ok(count.unwrap_or(0))
    }

    /// Last-message metadata of a stream: content, timestamp, sender.
    pub async fn last_message_meta(
        redis: &RedisClient,
        info_key: &str,
    ) -> AppResult<(String, String, Option<String>)> {
        let fields = Self::read_hash(redis, info_key).await?;
        Ok((
            fields.get("last_message").cloned().unwrap_or_default(),
            fields.get("last_message_time").cloned().unwrap_or_default(),
            fields.get("last_sender").cloned(),
        ))
    }

    /// Per-channel unread state for a user, restricted to channels they
    /// belong to. Rooms without activity have no hash and are absent.
    pub async fn channel_summary(
        redis: &RedisClient,
        identifier: &str,
        member_channels: &[Uuid],
    ) -> AppResult<Vec<UnreadUpdate>> {
        let keys = Self::scan_keys(redis, keys::CHANNEL_INFO_SCAN).await?;
        let mut updates = Vec::new();
        for key in &keys {
            let Some(channel_id) = keys::id_from_info_key(key).and_then(|s| s.parse().ok()) else {
                continue;
            };
            if !member_channels.contains(&channel_id) {
                continue;
            }
            let fields = Self::read_hash(redis, key).await?;
            updates.push(Self::build_update(
                Some(channel_id),
                None,
                identifier,
                &fields,
            ));
        }
        Ok(updates)
    }

    /// Per-conversation unread state for a user, restricted to
    /// conversations they participate in.
    pub async fn conversation_summary(
        redis: &RedisClient,
        identifier: &str,
    ) -> AppResult<Vec<UnreadUpdate>> {
        let keys = Self::scan_keys(redis, keys::CONVERSATION_INFO_SCAN).await?;
        let mut updates = Vec::new();
        for key in &keys {
            let Some(conversation_id) = keys::id_from_info_key(key) else {
                continue;
            };
            if !is_participant(conversation_id, identifier) {
                continue;
            }
            let fields = Self::read_hash(redis, key).await?;
            updates.push(Self::build_update(
                None,
                Some(conversation_id.to_string()),
                identifier,
                &fields,
            ));
        }
        Ok(updates)
    }

    fn build_update(
        channel_id: Option<Uuid>,
        conversation_id: Option<String>,
        identifier: &str,
        fields: &HashMap<String, String>,
    ) -> UnreadUpdate {
        let is_channel = channel_id.is_some();
        UnreadUpdate {
            channel_id,
            conversation_id,
            count: fields
                .get(&Self::counter_field(identifier))
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            last_message: fields.get("last_message").cloned().unwrap_or_default(),
            last_message_time: fields.get("last_message_time").cloned().unwrap_or_default(),
            is_channel,
            sender_id: fields.get("last_sender").cloned(),
        }
    }

    async fn scan_keys(redis: &RedisClient, pattern: &str) -> AppResult<Vec<String>> {
        let mut conn = redis.connection().await;
        let mut iter = conn.scan_match::<_, String>(pattern).await?;
        let mut found = Vec::new();
        while let Some(key) = iter.next_item().await {
            found.push(key);
        }
        Ok(found)
    }

    async fn read_hash(redis: &RedisClient, key: &str) -> AppResult<HashMap<String, String>> {
        let mut conn = redis.connection().await;
        Ok(conn.hgetall(key).await?)
    }
}

/// Whether an identifier is one of a conversation id's two sides. The id
/// is the sorted pair joined by `_`, so a side is either the prefix or
/// the suffix.
pub fn is_participant(conversation_id: &str, identifier: &str) -> bool {
    conversation_id
        .strip_prefix(identifier)
        .is_some_and(|rest| rest.starts_with('_'))
        || conversation_id
            .strip_suffix(identifier)
            .is_some_and(|rest| rest.ends_with('_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_matches_both_sides() {
        let id = keys::conversation_id("did:privy:abc", "0xDEAD");
        assert!(is_participant(&id, "did:privy:abc"));
        assert!(is_participant(&id, "0xDEAD"));
        assert!(!is_participant(&id, "0xBEEF"));
    }

    #[test]
    fn participant_rejects_partial_identifier() {
        let id = keys::conversation_id("alice", "bob");
        assert!(!is_participant(&id, "ali"));
        assert!(!is_participant(&id, "ob"));
    }
}
