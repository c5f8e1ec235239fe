//! Unread counter reads and resets.

use crate::error::{AppError, AppResult};
use crate::keys;
use crate::services::channel_service::ChannelService;
use crate::services::identity_service::IdentityService;
use crate::services::unread_service::UnreadService;
use crate::state::AppState;
use crate::websocket::events::{ServerEvent, UnreadUpdate};
use crate::websocket::SubscriberId;
use uuid::Uuid;

/// The client read a room; zero its counter and clear the badge on all
/// of the user's connections.
pub async fn message_read(
    state: &AppState,
    _conn: SubscriberId,
    user_id: String,
    channel_id: Option<Uuid>,
    conversation_id: Option<String>,
) -> AppResult<()> {
    let info_key = match (channel_id, &conversation_id) {
        (Some(channel), _) => keys::channel_info(channel),
        (None, Some(conversation)) => keys::conversation_info(conversation),
        (None, None) => {
            return Err(AppError::BadRequest(
                "message_read requires a channel or conversation".into(),
            ))
        }
    };

    UnreadService::reset(&state.redis, &info_key, &user_id).await?;

    let (last_message, last_message_time, sender_id) =
        UnreadService::last_message_meta(&state.redis, &info_key).await?;
    let event = ServerEvent::UnreadCounts {
        update: UnreadUpdate {
            channel_id,
            conversation_id,
            count: 0,
            last_message,
            last_message_time,
            is_channel: channel_id.is_some(),
            sender_id,
        },
    };
    state
        .registry
        .broadcast(&keys::personal_room(&user_id), &event.to_json())
        .await;
    Ok(())
}

/// Hydration: rebuild the full badge state for a reconnecting client.
pub async fn fetch_unread_counts(
    state: &AppState,
    conn: SubscriberId,
    user_id: String,
) -> AppResult<()> {
    let user = IdentityService::resolve_or_create(&state.db, &user_id).await?;
    let member_channels = ChannelService::channel_ids_for_user(&state.db, user.id).await?;

    let channels = UnreadService::channel_summary(&state.redis, &user_id, &member_channels).await?;
    let direct_messages = UnreadService::conversation_summary(&state.redis, &user_id).await?;

    state
        .registry
        .send_to(
            conn,
            &ServerEvent::UnreadSummary {
                channels,
                direct_messages,
            }
            .to_json(),
        )
        .await;
    Ok(())
}
