//! Namespaced key builders for the ephemeral store and room names.
//!
//! Presence, unread counters, typing state and the message cache all live
//! in Redis under ad hoc string keys; every key is built here so the
//! namespace layout exists in exactly one place.

use uuid::Uuid;

pub const PRESENCE_SCAN: &str = "presence:*";
pub const CHANNEL_INFO_SCAN: &str = "channel:*:info";
pub const CONVERSATION_INFO_SCAN: &str = "conversation:*:info";

/// Room a channel's events are multicast to.
pub fn channel_room(channel_id: Uuid) -> String {
    channel_id.to_string()
}

/// Room a direct-message conversation's events are multicast to.
pub fn conversation_room(conversation_id: &str) -> String {
    conversation_id.to_string()
}

/// Per-user notification room, reachable from all of a user's connections.
pub fn personal_room(identifier: &str) -> String {
    format!("user:{identifier}")
}

/// Deterministic two-party conversation id: sorted pair joined by a fixed
/// delimiter, so both sides derive the same id regardless of argument order.
pub fn conversation_id(a: &str, b: &str) -> String {
    let mut pair = [a, b];
    pair.sort_unstable();
    pair.join("_")
}

/// Hash holding per-user unread counters and last-message metadata.
pub fn channel_info(channel_id: Uuid) -> String {
    format!("channel:{channel_id}:info")
}

pub fn conversation_info(conversation_id: &str) -> String {
    format!("conversation:{conversation_id}:info")
}

pub fn presence(identifier: &str) -> String {
    format!("presence:{identifier}")
}

pub fn typing(room: &str) -> String {
    format!("typing:{room}")
}

pub fn message_cache(room_kind: &str, id: &str) -> String {
    format!("cache:messages:{room_kind}:{id}")
}

/// Extracts the middle segment of `channel:{id}:info` / `conversation:{id}:info`.
pub fn id_from_info_key(key: &str) -> Option<&str> {
    let rest = key.split_once(':')?.1;
    let (id, tail) = rest.rsplit_once(':')?;
    (tail == "info" && !id.is_empty()).then_some(id)
}

/// Extracts the identifier from `presence:{identifier}`.
pub fn identifier_from_presence_key(key: &str) -> Option<&str> {
    key.strip_prefix("presence:").filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_id_is_order_independent() {
        let a = "did:privy:abc123";
        let b = "0xABCDEF0123456789";
        assert_eq!(conversation_id(a, b), conversation_id(b, a));
    }

    #[test]
    fn conversation_id_uses_fixed_delimiter() {
        assert_eq!(conversation_id("beta", "alpha"), "alpha_beta");
    }

    #[test]
    fn info_key_round_trips() {
        let channel = Uuid::new_v4();
        let key = channel_info(channel);
        assert_eq!(id_from_info_key(&key), Some(channel.to_string().as_str()));

        let conv = conversation_id("a", "b");
        let key = conversation_info(&conv);
        assert_eq!(id_from_info_key(&key), Some(conv.as_str()));
    }

    #[test]
    fn info_key_rejects_garbage() {
        assert_eq!(id_from_info_key("presence:foo"), None);
        assert_eq!(id_from_info_key("channel::info"), None);
    }

    #[test]
    fn presence_key_round_trips() {
        let key = presence("0xABC");
        assert_eq!(identifier_from_presence_key(&key), Some("0xABC"));
        assert_eq!(identifier_from_presence_key("typing:room"), None);
    }

    #[test]
    fn personal_room_is_prefixed() {
        assert_eq!(personal_room("did:privy:x"), "user:did:privy:x");
    }
}
