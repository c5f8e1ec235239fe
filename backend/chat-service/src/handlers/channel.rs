//! Channel join/leave and channel message flow.

use crate::error::AppResult;
use crate::keys;
use crate::models::{Message, MessageFilter, MessageType, NewMessage};
use crate::services::channel_service::ChannelService;
use crate::services::identity_service::IdentityService;
use crate::services::message_cache::MessageCache;
use crate::services::message_service::MessageService;
use crate::services::unread_service::UnreadService;
use crate::state::AppState;
use crate::websocket::events::{AttachmentUpload, ServerEvent, UnreadUpdate};
use crate::websocket::SubscriberId;
use uuid::Uuid;

pub async fn join_channel(
    state: &AppState,
    conn: SubscriberId,
    channel_id: Uuid,
    user_id: String,
) -> AppResult<()> {
    let user = IdentityService::resolve_or_create(&state.db, &user_id).await?;
    ChannelService::require_membership(&state.db, channel_id, user.id).await?;

    // A connection reads one room at a time: switching drops every other
    // room except the personal one.
    let personal = keys::personal_room(&user_id);
    let room = keys::channel_room(channel_id);
    state
        .registry
        .leave_all_except(conn, &[personal.as_str(), room.as_str()])
        .await;
    state.registry.join(&personal, conn).await;
    state.registry.join(&room, conn).await;

    // Joining counts as reading.
    UnreadService::reset(&state.redis, &keys::channel_info(channel_id), &user_id).await?;

    let history = super::load_history(state, &MessageFilter::Channel(channel_id)).await?;
    state
        .registry
        .send_to(conn, &ServerEvent::MessageHistory { messages: history }.to_json())
        .await;

    state
        .registry
        .broadcast(
            &room,
            &ServerEvent::UserJoined {
                user_id,
                username: user.display_name,
            }
            .to_json(),
        )
        .await;
    Ok(())
}

pub async fn leave_channel(
    state: &AppState,
    conn: SubscriberId,
    channel_id: Uuid,
    user_id: String,
) -> AppResult<()> {
    let room = keys::channel_room(channel_id);
    state.registry.leave(&room, conn).await;
    state
        .registry
        .broadcast(&room, &ServerEvent::UserLeft { user_id }.to_json())
        .await;
    Ok(())
}

pub async fn send_message(
    state: &AppState,
    _conn: SubscriberId,
    channel_id: Uuid,
    user_id: String,
    content: String,
    message_type: MessageType,
    attachment_data: Option<AttachmentUpload>,
) -> AppResult<()> {
    let user = IdentityService::resolve_or_create(&state.db, &user_id).await?;
    ChannelService::require_membership(&state.db, channel_id, user.id).await?;

    let attachment_url = match &attachment_data {
        Some(upload) => Some(super::store_attachment(state, upload).await?),
        None => None,
    };

    let message = MessageService::append(
        &state.db,
        NewMessage {
            channel_id: Some(channel_id),
            conversation_id: None,
            sender_id: user_id,
            sender_name: user.display_name,
            sender_avatar: user.avatar_url,
            recipient_id: None,
            content,
            message_type,
            attachment_url,
        },
    )
    .await?;

    MessageCache::prepend(&state.redis, &message).await;
    state
        .registry
        .broadcast(
            &keys::channel_room(channel_id),
            &ServerEvent::ReceiveMessage {
                message: message.clone(),
            }
            .to_json(),
        )
        .await;

    notify_channel_unread(state, channel_id, &message).await
}

/// Push unread updates to every member's personal room. Members with a
/// connection sitting in the channel room are reading it live, so their
/// counter is reported as-is instead of incremented; everyone still gets
/// the event so chat lists refresh.
async fn notify_channel_unread(
    state: &AppState,
    channel_id: Uuid,
    message: &Message,
) -> AppResult<()> {
    let info_key = keys::channel_info(channel_id);
    let timestamp = message.created_at.to_rfc3339();
    UnreadService::record_message(
        &state.redis,
        &info_key,
        &message.content,
        &message.sender_id,
        &timestamp,
    )
    .await?;

    let room = keys::channel_room(channel_id);
    for member in ChannelService::members(&state.db, channel_id).await? {
        if member.identifier == message.sender_id {
            continue;
        }
        let personal = keys::personal_room(&member.identifier);
        let count = if state.registry.rooms_intersect(&room, &personal).await {
            UnreadService::count(&state.redis, &info_key, &member.identifier).await?
        } else {
            UnreadService::increment(&state.redis, &info_key, &member.identifier).await?
        };

        let event = ServerEvent::UnreadCounts {
            update: UnreadUpdate {
                channel_id: Some(channel_id),
                conversation_id: None,
                count,
                last_message: message.content.clone(),
                last_message_time: timestamp.clone(),
                is_channel: true,
                sender_id: Some(message.sender_id.clone()),
            },
        };
        state.registry.broadcast(&personal, &event.to_json()).await;
    }
    Ok(())
}
