use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named multi-party room. Created out of band by the administrative
/// API (or the `create_group` event); this service reads it and manages
/// membership.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Channel {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub is_private: bool,
    pub is_active: bool,
    pub created_by: String,
    pub group_kind: String,
    pub avatar_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Moderator,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Admin => "admin",
            MemberRole::Moderator => "moderator",
            MemberRole::Member => "member",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "admin" => MemberRole::Admin,
            "moderator" => MemberRole::Moderator,
            _ => MemberRole::Member,
        }
    }
}

/// Typed-identifier membership row: `user_id` is the canonical record,
/// `identifier` keeps the external form the member was added under.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChannelMember {
    pub channel_id: Uuid,
    pub user_id: Uuid,
    pub identifier: String,
    pub identifier_kind: String,
    pub display_name: String,
    pub member_role: String,
    pub created_at: DateTime<Utc>,
}

impl ChannelMember {
    pub fn role(&self) -> MemberRole {
        MemberRole::from_str(&self.member_role)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == MemberRole::Admin
    }
}
