//! Group lifecycle: creation, membership management, listings.

use crate::error::{AppError, AppResult};
use crate::identity::Identity;
use crate::keys;
use crate::models::MemberRole;
use crate::services::channel_service::ChannelService;
use crate::services::identity_service::IdentityService;
use crate::services::presence_service::PresenceService;
use crate::state::AppState;
use crate::websocket::events::{AddedMember, GroupMemberView, GroupView, ServerEvent};
use crate::websocket::SubscriberId;
use uuid::Uuid;

#[allow(clippy::too_many_arguments)]
pub async fn create_group(
    state: &AppState,
    conn: SubscriberId,
    name: String,
    description: String,
    created_by: String,
    is_private: bool,
    members: Vec<String>,
    avatar_url: String,
) -> AppResult<()> {
    let creator_identity = Identity::parse(&created_by)?;
    let creator = IdentityService::resolve_or_create_parsed(&state.db, &creator_identity).await?;

    let channel = ChannelService::create(
        &state.db,
        &name,
        &description,
        &creator_identity,
        is_private,
        &avatar_url,
    )
    .await?;
    ChannelService::add_member(
        &state.db,
        channel.id,
        &creator,
        &creator_identity,
        MemberRole::Admin,
    )
    .await?;

    for raw in &members {
        if raw == &created_by {
            continue;
        }
        let identity = match Identity::parse(raw) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(identifier = %raw, error = %e, "skipping invalid group member");
                continue;
            }
        };
        let member = IdentityService::resolve_or_create_parsed(&state.db, &identity).await?;
        ChannelService::add_member(&state.db, channel.id, &member, &identity, MemberRole::Member)
            .await?;
    }

    state
        .registry
        .join(&keys::channel_room(channel.id), conn)
        .await;
    state
        .registry
        .send_to(
            conn,
            &ServerEvent::GroupCreated {
                success: true,
                group_id: channel.id,
                name: channel.name,
            }
            .to_json(),
        )
        .await;
    Ok(())
}

pub async fn add_group_member(
    state: &AppState,
    conn: SubscriberId,
    group_id: Uuid,
    user_id: String,
    member_ids: Vec<String>,
) -> AppResult<()> {
    let requester = IdentityService::resolve_or_create(&state.db, &user_id).await?;
    ChannelService::require_admin(&state.db, group_id, requester.id).await?;

    let mut added = Vec::new();
    let mut already_members = Vec::new();
    for raw in &member_ids {
        let identity = Identity::parse(raw)?;
        let member = IdentityService::resolve_or_create_parsed(&state.db, &identity).await?;
        match ChannelService::add_member(&state.db, group_id, &member, &identity, MemberRole::Member)
            .await?
        {
            Some(row) => added.push(AddedMember {
                id: raw.clone(),
                display_name: row.display_name,
            }),
            None => already_members.push(AddedMember {
                id: raw.clone(),
                display_name: member.display_name,
            }),
        }
    }

    if added.is_empty() && !already_members.is_empty() {
        return Err(AppError::DuplicateMembership);
    }

    state
        .registry
        .broadcast(
            &keys::channel_room(group_id),
            &ServerEvent::MembersAdded {
                group_id,
                members: added.clone(),
            }
            .to_json(),
        )
        .await;
    state
        .registry
        .send_to(
            conn,
            &ServerEvent::MembersAddedSuccess {
                success: true,
                group_id,
                members: added,
                already_members,
            }
            .to_json(),
        )
        .await;
    Ok(())
}

pub async fn get_user_groups(
    state: &AppState,
    conn: SubscriberId,
    user_id: String,
) -> AppResult<()> {
    let user = IdentityService::resolve_or_create(&state.db, &user_id).await?;
    let groups = ChannelService::groups_for_user(&state.db, user.id)
        .await?
        .into_iter()
        .map(|(channel, role)| GroupView {
            group_id: channel.id,
            name: channel.name,
            description: channel.description,
            is_private: channel.is_private,
            role,
            avatar_url: channel.avatar_url,
            created_at: channel.created_at,
        })
        .collect();

    state
        .registry
        .send_to(conn, &ServerEvent::UserGroups { groups }.to_json())
        .await;
    Ok(())
}

pub async fn get_group_members(
    state: &AppState,
    conn: SubscriberId,
    group_id: Uuid,
) -> AppResult<()> {
    ChannelService::get(&state.db, group_id).await?;

    let mut views = Vec::new();
    for member in ChannelService::members(&state.db, group_id).await? {
        let presence = PresenceService::get(&state.redis, &member.identifier).await?;
        let avatar_url = IdentityService::find(&state.db, &Identity::Internal(member.user_id))
            .await?
            .map(|user| user.avatar_url)
            .unwrap_or_default();
        views.push(GroupMemberView {
            id: member.identifier,
            display_name: member.display_name,
            role: member.member_role,
            status: presence.status,
            avatar_url,
        });
    }

    state
        .registry
        .send_to(
            conn,
            &ServerEvent::GroupMembers {
                group_id,
                members: views,
            }
            .to_json(),
        )
        .await;
    Ok(())
}
