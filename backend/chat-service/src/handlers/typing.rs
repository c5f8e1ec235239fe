//! Typing indicators, mirrored to the room with the sender's display
//! name attached.

use crate::error::{AppError, AppResult};
use crate::keys;
use crate::services::identity_service::IdentityService;
use crate::services::typing_service::TypingService;
use crate::state::AppState;
use crate::websocket::events::ServerEvent;
use crate::websocket::SubscriberId;
use uuid::Uuid;

fn room_for(channel_id: Option<Uuid>, conversation_id: Option<String>) -> AppResult<String> {
    match (channel_id, conversation_id) {
        (Some(channel), _) => Ok(keys::channel_room(channel)),
        (None, Some(conversation)) => Ok(keys::conversation_room(&conversation)),
        (None, None) => Err(AppError::BadRequest(
            "typing event requires a channel or conversation".into(),
        )),
    }
}

pub async fn typing(
    state: &AppState,
    _conn: SubscriberId,
    user_id: String,
    channel_id: Option<Uuid>,
    conversation_id: Option<String>,
) -> AppResult<()> {
    let user = IdentityService::resolve_or_create(&state.db, &user_id).await?;
    let room = room_for(channel_id, conversation_id)?;

    TypingService::start(&state.redis, &room, &user_id, &user.display_name).await?;
    state
        .registry
        .broadcast(
            &room,
            &ServerEvent::Typing {
                user_id,
                name: user.display_name,
            }
            .to_json(),
        )
        .await;
    Ok(())
}

pub async fn stop_typing(
    state: &AppState,
    _conn: SubscriberId,
    user_id: String,
    channel_id: Option<Uuid>,
    conversation_id: Option<String>,
) -> AppResult<()> {
    let room = room_for(channel_id, conversation_id)?;

    TypingService::stop(&state.redis, &room, &user_id).await?;
    state
        .registry
        .broadcast(&room, &ServerEvent::StopTyping { user_id }.to_json())
        .await;
    Ok(())
}
