//! Real-time event surface.
//!
//! Inbound client events and outbound server events are explicit enums
//! with one serialization point each. Every payload is a flat JSON object
//! carrying a snake_case `type` discriminator over camelCase field keys;
//! both, along with the long-standing `recived_dm` spelling, are the wire
//! contract and must not drift.

use crate::models::{Message, MessageType, Reaction, SeenEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Base64 attachment payload uploaded alongside a message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentUpload {
    pub file_path: String,
    pub data: String,
    pub mime_type: String,
}

/// Events a client may send over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    JoinChannel {
        channel_id: Uuid,
        user_id: String,
    },
    LeaveChannel {
        channel_id: Uuid,
        user_id: String,
    },
    SendMessage {
        channel_id: Uuid,
        user_id: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        message_type: MessageType,
        #[serde(default)]
        attachment_data: Option<AttachmentUpload>,
    },
    JoinDm {
        conversation_id: String,
        user_id: String,
    },
    SendDm {
        sender_id: String,
        recipient_id: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        message_type: MessageType,
        #[serde(default)]
        conversation_id: Option<String>,
        #[serde(default)]
        attachment_data: Option<AttachmentUpload>,
    },
    LeaveDm {
        conversation_id: String,
    },
    AddReaction {
        message_id: Uuid,
        emoji: String,
        user_id: String,
    },
    RemoveReaction {
        message_id: Uuid,
        emoji: String,
        user_id: String,
    },
    EditMessage {
        message_id: Uuid,
        new_content: String,
        user_id: String,
        #[serde(default)]
        channel_id: Option<Uuid>,
        #[serde(default)]
        conversation_id: Option<String>,
    },
    MarkMessageSeen {
        channel_id: Uuid,
        user_id: String,
        message_id: Uuid,
    },
    Typing {
        user_id: String,
        #[serde(default)]
        channel_id: Option<Uuid>,
        #[serde(default)]
        conversation_id: Option<String>,
    },
    StopTyping {
        user_id: String,
        #[serde(default)]
        channel_id: Option<Uuid>,
        #[serde(default)]
        conversation_id: Option<String>,
    },
    UserOnline {
        user_id: String,
        #[serde(default)]
        eth_address: Option<String>,
    },
    MessageRead {
        user_id: String,
        #[serde(default)]
        channel_id: Option<Uuid>,
        #[serde(default)]
        conversation_id: Option<String>,
    },
    FetchUnreadCounts {
        user_id: String,
    },
    JoinUserRoom {
        user_id: String,
    },
    CheckUserPresence {
        user_id: String,
    },
    CreateGroup {
        name: String,
        #[serde(default)]
        description: String,
        created_by: String,
        #[serde(default)]
        is_private: bool,
        #[serde(default)]
        members: Vec<String>,
        #[serde(default)]
        avatar_url: String,
    },
    AddGroupMember {
        group_id: Uuid,
        user_id: String,
        member_ids: Vec<String>,
    },
    GetUserGroups {
        user_id: String,
    },
    GetGroupMembers {
        group_id: Uuid,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub user_id: String,
    pub status: String,
    pub last_seen: Option<i64>,
}

/// Per-room unread counter update pushed to personal rooms.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub count: i64,
    pub last_message: String,
    pub last_message_time: String,
    pub is_channel: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    pub group_id: Uuid,
    pub name: String,
    pub description: String,
    pub is_private: bool,
    pub role: String,
    pub avatar_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMemberView {
    pub id: String,
    pub display_name: String,
    pub role: String,
    pub status: String,
    pub avatar_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedMember {
    pub id: String,
    pub display_name: String,
}

/// Events the server emits. Serialization happens in exactly one place
/// ([`ServerEvent::to_json`]); handlers never hand-build payload JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    MessageHistory {
        messages: Vec<Message>,
    },
    PrivateMessageHistory {
        messages: Vec<Message>,
    },
    UserJoined {
        user_id: String,
        username: String,
    },
    UserLeft {
        user_id: String,
    },
    ReceiveMessage {
        message: Message,
    },
    /// Direct-message delivery. The event name is misspelled on the wire
    /// and clients depend on it.
    RecivedDm {
        message: Message,
    },
    ReactionUpdated {
        message_id: Uuid,
        reactions: Vec<Reaction>,
    },
    MessageEdited {
        message_id: Uuid,
        new_content: String,
        edited: bool,
    },
    MessageSeenUpdate {
        message_id: Uuid,
        seen_users: Vec<SeenEntry>,
    },
    Typing {
        user_id: String,
        name: String,
    },
    StopTyping {
        user_id: String,
    },
    UserPresenceUpdated {
        user_id: String,
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        last_seen: Option<i64>,
    },
    AllUsersPresence {
        users: Vec<PresenceEntry>,
    },
    UserPresenceStatus {
        user_id: String,
        status: String,
        last_seen: Option<i64>,
    },
    UnreadCounts {
        #[serde(flatten)]
        update: UnreadUpdate,
    },
    /// Hydration summary; shares the `unread_counts` wire name with the
    /// per-room update, distinguished by payload shape.
    #[serde(rename = "unread_counts")]
    UnreadSummary {
        channels: Vec<UnreadUpdate>,
        direct_messages: Vec<UnreadUpdate>,
    },
    GroupCreated {
        success: bool,
        group_id: Uuid,
        name: String,
    },
    MembersAdded {
        group_id: Uuid,
        members: Vec<AddedMember>,
    },
    MembersAddedSuccess {
        success: bool,
        group_id: Uuid,
        members: Vec<AddedMember>,
        already_members: Vec<AddedMember>,
    },
    UserGroups {
        groups: Vec<GroupView>,
    },
    GroupMembers {
        group_id: Uuid,
        members: Vec<GroupMemberView>,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MessageHistory { .. } => "message_history",
            Self::PrivateMessageHistory { .. } => "private_message_history",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::ReceiveMessage { .. } => "receive_message",
            Self::RecivedDm { .. } => "recived_dm",
            Self::ReactionUpdated { .. } => "reaction_updated",
            Self::MessageEdited { .. } => "message_edited",
            Self::MessageSeenUpdate { .. } => "message_seen_update",
            Self::Typing { .. } => "typing",
            Self::StopTyping { .. } => "stop_typing",
            Self::UserPresenceUpdated { .. } => "user_presence_updated",
            Self::AllUsersPresence { .. } => "all_users_presence",
            Self::UserPresenceStatus { .. } => "user_presence_status",
            Self::UnreadCounts { .. } | Self::UnreadSummary { .. } => "unread_counts",
            Self::GroupCreated { .. } => "group_created",
            Self::MembersAdded { .. } => "members_added",
            Self::MembersAddedSuccess { .. } => "members_added_success",
            Self::UserGroups { .. } => "user_groups",
            Self::GroupMembers { .. } => "group_members",
            Self::Error { .. } => "error",
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, event = self.event_type(), "failed to serialize event");
            format!(r#"{{"type":"error","message":"failed to serialize {}"}}"#, self.event_type())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_parses_send_message() {
        let raw = serde_json::json!({
            "type": "send_message",
            "channelId": Uuid::new_v4(),
            "userId": "did:privy:abc",
            "content": "hi",
        })
        .to_string();
        let evt: ClientEvent = serde_json::from_str(&raw).unwrap();
        match evt {
            ClientEvent::SendMessage {
                content,
                message_type,
                attachment_data,
                ..
            } => {
                assert_eq!(content, "hi");
                assert_eq!(message_type, MessageType::Text);
                assert!(attachment_data.is_none());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn client_payload_keys_are_camel_case() {
        let channel = Uuid::new_v4();
        let raw = serde_json::json!({
            "type": "join_channel",
            "channelId": channel,
            "userId": "did:privy:abc",
        })
        .to_string();
        match serde_json::from_str::<ClientEvent>(&raw).unwrap() {
            ClientEvent::JoinChannel {
                channel_id,
                user_id,
            } => {
                assert_eq!(channel_id, channel);
                assert_eq!(user_id, "did:privy:abc");
            }
            other => panic!("unexpected event {other:?}"),
        }

        let raw = serde_json::json!({
            "type": "edit_message",
            "messageId": Uuid::new_v4(),
            "newContent": "fixed",
            "userId": "0xDEAD1",
        })
        .to_string();
        assert!(matches!(
            serde_json::from_str::<ClientEvent>(&raw).unwrap(),
            ClientEvent::EditMessage { .. }
        ));
    }

    #[test]
    fn server_payload_keys_are_camel_case() {
        let evt = ServerEvent::MessageSeenUpdate {
            message_id: Uuid::new_v4(),
            seen_users: vec![SeenEntry {
                id: "u1".into(),
                name: "Alice".into(),
                avatar: String::new(),
            }],
        };
        let parsed: serde_json::Value = serde_json::from_str(&evt.to_json()).unwrap();
        assert!(parsed.get("messageId").is_some());
        assert!(parsed["seenUsers"].is_array());
        assert!(parsed.get("message_id").is_none());

        let evt = ServerEvent::UserPresenceUpdated {
            user_id: "u1".into(),
            status: "offline".into(),
            last_seen: Some(1_700_000_000),
        };
        let parsed: serde_json::Value = serde_json::from_str(&evt.to_json()).unwrap();
        assert_eq!(parsed["userId"], "u1");
        assert_eq!(parsed["lastSeen"], 1_700_000_000);
    }

    #[test]
    fn dm_event_keeps_wire_spelling() {
        let evt = ServerEvent::UserLeft {
            user_id: "u".into(),
        };
        assert_eq!(evt.event_type(), "user_left");

        let parsed: serde_json::Value =
            serde_json::from_str(&evt.to_json()).unwrap();
        assert_eq!(parsed["type"], "user_left");
    }

    #[test]
    fn unread_variants_share_wire_name() {
        let update = ServerEvent::UnreadCounts {
            update: UnreadUpdate {
                channel_id: None,
                conversation_id: Some("a_b".into()),
                count: 3,
                last_message: "yo".into(),
                last_message_time: Utc::now().to_rfc3339(),
                is_channel: false,
                sender_id: None,
            },
        };
        let summary = ServerEvent::UnreadSummary {
            channels: Vec::new(),
            direct_messages: Vec::new(),
        };

        let update_json: serde_json::Value =
            serde_json::from_str(&update.to_json()).unwrap();
        let summary_json: serde_json::Value =
            serde_json::from_str(&summary.to_json()).unwrap();

        assert_eq!(update_json["type"], "unread_counts");
        assert_eq!(update_json["count"], 3);
        assert_eq!(update_json["conversationId"], "a_b");
        assert!(update_json.get("lastMessage").is_some());
        assert_eq!(summary_json["type"], "unread_counts");
        assert!(summary_json["channels"].is_array());
        assert!(summary_json["directMessages"].is_array());
    }

    #[test]
    fn typing_event_is_mirrored_shape() {
        let evt = ServerEvent::Typing {
            user_id: "u1".into(),
            name: "Alice".into(),
        };
        let parsed: serde_json::Value = serde_json::from_str(&evt.to_json()).unwrap();
        assert_eq!(parsed["type"], "typing");
        assert_eq!(parsed["name"], "Alice");
    }
}
