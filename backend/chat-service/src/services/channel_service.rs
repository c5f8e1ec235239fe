use crate::error::{is_unique_violation, AppError, AppResult};
use crate::identity::Identity;
use crate::models::{Channel, ChannelMember, MemberRole, User};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

const CHANNEL_COLUMNS: &str =
    "id, name, description, is_private, is_active, created_by, group_kind, avatar_url, created_at";
const MEMBER_COLUMNS: &str =
    "channel_id, user_id, identifier, identifier_kind, display_name, member_role, created_at";

pub struct ChannelService;

impl ChannelService {
    pub async fn get(db: &Pool<Postgres>, channel_id: Uuid) -> AppResult<Channel> {
        sqlx::query_as::<_, Channel>(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = $1"
        ))
        .bind(channel_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound("channel"))
    }

    pub async fn membership(
        db: &Pool<Postgres>,
        channel_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Option<ChannelMember>> {
        Ok(sqlx::query_as::<_, ChannelMember>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM channel_members WHERE channel_id = $1 AND user_id = $2"
        ))
        .bind(channel_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?)
    }

    /// Membership gate: join and send both require a membership row.
    pub async fn require_membership(
        db: &Pool<Postgres>,
        channel_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<ChannelMember> {
        Self::membership(db, channel_id, user_id)
            .await?
            .ok_or_else(|| AppError::Forbidden("you are not a member of this channel".into()))
    }

    pub async fn require_admin(
        db: &Pool<Postgres>,
        channel_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<ChannelMember> {
        let member = Self::require_membership(db, channel_id, user_id).await?;
        if !member.is_admin() {
            return Err(AppError::Forbidden(
                "you do not have permission to add members to this group".into(),
            ));
        }
        Ok(member)
    }

    /// Insert a membership row; `Ok(None)` when the user already holds
    /// one (unique on (channel_id, user_id)).
    pub async fn add_member(
        db: &Pool<Postgres>,
        channel_id: Uuid,
        user: &User,
        identity: &Identity,
        role: MemberRole,
    ) -> AppResult<Option<ChannelMember>> {
        // Snapshot the profile name; the derived label is only a fallback
        // for records that never set one.
        let display_name = if user.display_name.is_empty() {
            identity.display_label()
        } else {
            user.display_name.clone()
        };
        let result = sqlx::query_as::<_, ChannelMember>(&format!(
            r#"
            INSERT INTO channel_members
                (channel_id, user_id, identifier, identifier_kind, display_name, member_role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {MEMBER_COLUMNS}
            "#
        ))
        .bind(channel_id)
        .bind(user.id)
        .bind(identity.as_raw())
        .bind(identity.kind().as_str())
        .bind(display_name)
        .bind(role.as_str())
        .fetch_one(db)
        .await;

        match result {
            Ok(member) => Ok(Some(member)),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn members(db: &Pool<Postgres>, channel_id: Uuid) -> AppResult<Vec<ChannelMember>> {
        Ok(sqlx::query_as::<_, ChannelMember>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM channel_members WHERE channel_id = $1 ORDER BY created_at"
        ))
        .bind(channel_id)
        .fetch_all(db)
        .await?)
    }

    /// Channel ids a user belongs to, for unread hydration filtering.
    pub async fn channel_ids_for_user(db: &Pool<Postgres>, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT channel_id FROM channel_members WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(db)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Channels a user belongs to, paired with their role.
    pub async fn groups_for_user(
        db: &Pool<Postgres>,
        user_id: Uuid,
    ) -> AppResult<Vec<(Channel, String)>> {
        let rows = sqlx::query_as::<_, ChannelWithRole>(
            r#"
            SELECT c.id, c.name, c.description, c.is_private, c.is_active,
                   c.created_by, c.group_kind, c.avatar_url, c.created_at,
                   m.member_role
            FROM channels c
            JOIN channel_members m ON m.channel_id = c.id
            WHERE m.user_id = $1
            ORDER BY c.created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    Channel {
                        id: row.id,
                        name: row.name,
                        description: row.description,
                        is_private: row.is_private,
                        is_active: row.is_active,
                        created_by: row.created_by,
                        group_kind: row.group_kind,
                        avatar_url: row.avatar_url,
                        created_at: row.created_at,
                    },
                    row.member_role,
                )
            })
            .collect())
    }

    pub async fn create(
        db: &Pool<Postgres>,
        name: &str,
        description: &str,
        created_by: &Identity,
        is_private: bool,
        avatar_url: &str,
    ) -> AppResult<Channel> {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest("channel name is required".into()));
        }
        let group_kind = match created_by {
            Identity::Chain(_) => "eth_based",
            _ => "regular",
        };
        Ok(sqlx::query_as::<_, Channel>(&format!(
            r#"
            INSERT INTO channels (name, description, created_by, is_private, group_kind, avatar_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CHANNEL_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(description)
        .bind(created_by.as_raw())
        .bind(is_private)
        .bind(group_kind)
        .bind(avatar_url)
        .fetch_one(db)
        .await?)
    }
}

#[derive(sqlx::FromRow)]
struct ChannelWithRole {
    id: Uuid,
    name: String,
    description: String,
    is_private: bool,
    is_active: bool,
    created_by: String,
    group_kind: String,
    avatar_url: String,
    created_at: chrono::DateTime<chrono::Utc>,
    member_role: String,
}
