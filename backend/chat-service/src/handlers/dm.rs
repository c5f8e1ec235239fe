//! Direct-message flow.
//!
//! A connection holds at most one active conversation room at a time:
//! joining a conversation leaves every other room except the personal
//! one. Conversation ids are derived from the sorted participant pair,
//! so either side lands in the same room.

use crate::error::AppResult;
use crate::identity::Identity;
use crate::keys;
use crate::models::{Message, MessageFilter, MessageType, NewMessage};
use crate::services::identity_service::IdentityService;
use crate::services::message_cache::MessageCache;
use crate::services::message_service::MessageService;
use crate::services::unread_service::UnreadService;
use crate::state::AppState;
use crate::websocket::events::{AttachmentUpload, ServerEvent, UnreadUpdate};
use crate::websocket::SubscriberId;

pub async fn join_dm(
    state: &AppState,
    conn: SubscriberId,
    conversation_id: String,
    user_id: String,
) -> AppResult<()> {
    IdentityService::resolve_or_create(&state.db, &user_id).await?;

    let personal = keys::personal_room(&user_id);
    let room = keys::conversation_room(&conversation_id);
    state
        .registry
        .leave_all_except(conn, &[personal.as_str(), room.as_str()])
        .await;
    state.registry.join(&personal, conn).await;
    state.registry.join(&room, conn).await;

    // Joining counts as reading.
    UnreadService::reset(
        &state.redis,
        &keys::conversation_info(&conversation_id),
        &user_id,
    )
    .await?;

    let history =
        super::load_history(state, &MessageFilter::Conversation(conversation_id)).await?;
    state
        .registry
        .send_to(
            conn,
            &ServerEvent::PrivateMessageHistory { messages: history }.to_json(),
        )
        .await;
    Ok(())
}

pub async fn leave_dm(
    state: &AppState,
    conn: SubscriberId,
    conversation_id: String,
) -> AppResult<()> {
    state
        .registry
        .leave(&keys::conversation_room(&conversation_id), conn)
        .await;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn send_dm(
    state: &AppState,
    _conn: SubscriberId,
    sender_id: String,
    recipient_id: String,
    content: String,
    message_type: MessageType,
    conversation_id: Option<String>,
    attachment_data: Option<AttachmentUpload>,
) -> AppResult<()> {
    let sender = IdentityService::resolve_or_create(&state.db, &sender_id).await?;
    Identity::parse(&recipient_id)?;

    let conversation =
        conversation_id.unwrap_or_else(|| keys::conversation_id(&sender_id, &recipient_id));

    let attachment_url = match &attachment_data {
        Some(upload) => Some(super::store_attachment(state, upload).await?),
        None => None,
    };

    let message = MessageService::append(
        &state.db,
        NewMessage {
            channel_id: None,
            conversation_id: Some(conversation.clone()),
            sender_id,
            sender_name: sender.display_name,
            sender_avatar: sender.avatar_url,
            recipient_id: Some(recipient_id.clone()),
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
            &keys::conversation_room(&conversation),
            &ServerEvent::RecivedDm {
                message: message.clone(),
            }
            .to_json(),
        )
        .await;

    notify_dm_unread(state, &conversation, &message, &recipient_id).await
}

/// Unread update for both sides: the recipient's counter grows unless
/// they are reading the conversation live; the sender's other devices
/// get the refreshed metadata with their own (unchanged) counter.
async fn notify_dm_unread(
    state: &AppState,
    conversation: &str,
    message: &Message,
    recipient_id: &str,
) -> AppResult<()> {
    let info_key = keys::conversation_info(conversation);
    let timestamp = message.created_at.to_rfc3339();
    UnreadService::record_message(
        &state.redis,
        &info_key,
        &message.content,
        &message.sender_id,
        &timestamp,
    )
    .await?;

    let room = keys::conversation_room(conversation);
    let recipient_personal = keys::personal_room(recipient_id);
    let recipient_count = if state.registry.rooms_intersect(&room, &recipient_personal).await {
        UnreadService::count(&state.redis, &info_key, recipient_id).await?
    } else {
        UnreadService::increment(&state.redis, &info_key, recipient_id).await?
    };

    let make_update = |count: i64| ServerEvent::UnreadCounts {
        update: UnreadUpdate {
            channel_id: None,
            conversation_id: Some(conversation.to_string()),
            count,
            last_message: message.content.clone(),
            last_message_time: timestamp.clone(),
            is_channel: false,
            sender_id: Some(message.sender_id.clone()),
        },
    };

    state
        .registry
        .broadcast(&recipient_personal, &make_update(recipient_count).to_json())
        .await;

    let sender_count = UnreadService::count(&state.redis, &info_key, &message.sender_id).await?;
    state
        .registry
        .broadcast(
            &keys::personal_room(&message.sender_id),
            &make_update(sender_count).to_json(),
        )
        .await;
    Ok(())
}
