use crate::keys;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Video,
    File,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Video => "video",
            MessageType::File => "file",
        }
    }
}

/// One (user, emoji) pair on a message. The `userId`/`reaction` keys are
/// part of the wire contract and of the stored JSONB shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub user_id: String,
    pub reaction: String,
}

/// Seen-receipt entry: user identity plus the display snapshot clients
/// render next to the watermark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub avatar: String,
}

/// Serialized with camelCase keys; this shape goes straight onto the
/// wire inside `receive_message`/`recived_dm` and into the cache.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub channel_id: Option<Uuid>,
    pub conversation_id: Option<String>,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_avatar: String,
    pub recipient_id: Option<String>,
    pub content: String,
    pub message_type: String,
    pub attachment_url: Option<String>,
    pub edited: bool,
    pub reactions: Json<Vec<Reaction>>,
    pub seen_by: Json<Vec<SeenEntry>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Room this message's events are multicast to.
    pub fn room(&self) -> String {
        match (&self.channel_id, &self.conversation_id) {
            (Some(channel), _) => keys::channel_room(*channel),
            (None, Some(conversation)) => keys::conversation_room(conversation),
            (None, None) => String::new(),
        }
    }

    pub fn filter(&self) -> Option<MessageFilter> {
        match (&self.channel_id, &self.conversation_id) {
            (Some(channel), _) => Some(MessageFilter::Channel(*channel)),
            (None, Some(conversation)) => Some(MessageFilter::Conversation(conversation.clone())),
            (None, None) => None,
        }
    }
}

/// Fields supplied by a handler when appending; the store assigns id and
/// timestamp and enforces the one-of-two-parent rule.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub channel_id: Option<Uuid>,
    pub conversation_id: Option<String>,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_avatar: String,
    pub recipient_id: Option<String>,
    pub content: String,
    pub message_type: MessageType,
    pub attachment_url: Option<String>,
}

/// Identifies a conversation-or-channel message stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageFilter {
    Channel(Uuid),
    Conversation(String),
}

impl MessageFilter {
    pub fn room(&self) -> String {
        match self {
            MessageFilter::Channel(id) => keys::channel_room(*id),
            MessageFilter::Conversation(id) => keys::conversation_room(id),
        }
    }

    pub fn cache_key(&self) -> String {
        match self {
            MessageFilter::Channel(id) => keys::message_cache("channel", &id.to_string()),
            MessageFilter::Conversation(id) => keys::message_cache("conversation", id),
        }
    }
}

/// Adds a (user, emoji) pair; returns false when the exact pair is
/// already present (idempotent, order-insensitive).
pub fn add_reaction(set: &mut Vec<Reaction>, user_id: &str, emoji: &str) -> bool {
    if set
        .iter()
        .any(|r| r.user_id == user_id && r.reaction == emoji)
    {
        return false;
    }
    set.push(Reaction {
        user_id: user_id.to_string(),
        reaction: emoji.to_string(),
    });
    true
}

/// Removes a (user, emoji) pair; returns false when nothing matched.
pub fn remove_reaction(set: &mut Vec<Reaction>, user_id: &str, emoji: &str) -> bool {
    let before = set.len();
    set.retain(|r| !(r.user_id == user_id && r.reaction == emoji));
    set.len() != before
}

pub fn already_seen(seen: &[SeenEntry], user_id: &str) -> bool {
    seen.iter().any(|entry| entry.id == user_id)
}

/// Overlays authoritative reaction/seen state onto cached messages.
/// Entries missing from `fresh` (deleted rows) are left untouched.
pub fn refresh_social_state(
    messages: &mut [Message],
    fresh: &std::collections::HashMap<Uuid, (Vec<Reaction>, Vec<SeenEntry>)>,
) {
    for message in messages.iter_mut() {
        if let Some((reactions, seen_by)) = fresh.get(&message.id) {
            message.reactions = Json(reactions.clone());
            message.seen_by = Json(seen_by.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_reaction_is_idempotent() {
        let mut set = Vec::new();
        assert!(add_reaction(&mut set, "u1", "👍"));
        assert!(!add_reaction(&mut set, "u1", "👍"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn same_user_different_emoji_both_kept() {
        let mut set = Vec::new();
        add_reaction(&mut set, "u1", "👍");
        add_reaction(&mut set, "u1", "🎉");
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn remove_reaction_only_drops_exact_pair() {
        let mut set = Vec::new();
        add_reaction(&mut set, "u1", "👍");
        add_reaction(&mut set, "u2", "👍");
        assert!(remove_reaction(&mut set, "u1", "👍"));
        assert!(!remove_reaction(&mut set, "u1", "👍"));
        assert_eq!(set, vec![Reaction { user_id: "u2".into(), reaction: "👍".into() }]);
    }

    #[test]
    fn message_room_prefers_channel() {
        let channel = Uuid::new_v4();
        let msg = Message {
            id: Uuid::new_v4(),
            channel_id: Some(channel),
            conversation_id: None,
            sender_id: "u1".into(),
            sender_name: String::new(),
            sender_avatar: String::new(),
            recipient_id: None,
            content: "hi".into(),
            message_type: "text".into(),
            attachment_url: None,
            edited: false,
            reactions: Json(Vec::new()),
            seen_by: Json(Vec::new()),
            created_at: Utc::now(),
        };
        assert_eq!(msg.room(), channel.to_string());
        assert_eq!(msg.filter(), Some(MessageFilter::Channel(channel)));
    }

    fn channel_message(channel: Uuid) -> Message {
        Message {
            id: Uuid::new_v4(),
            channel_id: Some(channel),
            conversation_id: None,
            sender_id: "u1".into(),
            sender_name: String::new(),
            sender_avatar: String::new(),
            recipient_id: None,
            content: "hi".into(),
            message_type: "text".into(),
            attachment_url: None,
            edited: false,
            reactions: Json(Vec::new()),
            seen_by: Json(Vec::new()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn refresh_overlays_authoritative_social_state() {
        let channel = Uuid::new_v4();
        let mut stale = channel_message(channel);
        add_reaction(&mut stale.reactions.0, "u1", "👍");
        let untouched = channel_message(channel);

        let mut fresh = std::collections::HashMap::new();
        fresh.insert(
            stale.id,
            (
                Vec::new(),
                vec![SeenEntry {
                    id: "u2".into(),
                    name: "Bob".into(),
                    avatar: String::new(),
                }],
            ),
        );

        let mut messages = vec![stale, untouched];
        refresh_social_state(&mut messages, &fresh);

        assert!(messages[0].reactions.0.is_empty());
        assert_eq!(messages[0].seen_by.0.len(), 1);
        assert!(messages[1].seen_by.0.is_empty());
    }

    #[test]
    fn message_serializes_with_camel_case_keys() {
        let mut reactions = Vec::new();
        add_reaction(&mut reactions, "u1", "👍");
        let msg = Message {
            id: Uuid::new_v4(),
            channel_id: Some(Uuid::new_v4()),
            conversation_id: None,
            sender_id: "did:privy:abc".into(),
            sender_name: "Alice".into(),
            sender_avatar: String::new(),
            recipient_id: None,
            content: "hi".into(),
            message_type: "text".into(),
            attachment_url: None,
            edited: false,
            reactions: Json(reactions),
            seen_by: Json(Vec::new()),
            created_at: Utc::now(),
        };

        let parsed: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert!(parsed.get("channelId").is_some());
        assert_eq!(parsed["senderId"], "did:privy:abc");
        assert_eq!(parsed["messageType"], "text");
        assert_eq!(parsed["reactions"][0]["userId"], "u1");
        assert!(parsed["seenBy"].is_array());
        assert!(parsed.get("sender_id").is_none());
    }
}
