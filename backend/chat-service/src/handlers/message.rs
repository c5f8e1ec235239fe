//! Message edits and seen receipts.

use crate::error::AppResult;
use crate::models::SeenEntry;
use crate::services::identity_service::IdentityService;
use crate::services::message_cache::MessageCache;
use crate::services::message_service::MessageService;
use crate::state::AppState;
use crate::websocket::events::ServerEvent;
use crate::websocket::SubscriberId;
use uuid::Uuid;

pub async fn edit_message(
    state: &AppState,
    _conn: SubscriberId,
    message_id: Uuid,
    new_content: String,
    user_id: String,
) -> AppResult<()> {
    IdentityService::resolve_or_create(&state.db, &user_id).await?;
    let message = MessageService::edit(&state.db, message_id, &user_id, &new_content).await?;

    MessageCache::rewrite(&state.redis, &message).await;
    state
        .registry
        .broadcast(
            &message.room(),
            &ServerEvent::MessageEdited {
                message_id,
                new_content: message.content.clone(),
                edited: true,
            }
            .to_json(),
        )
        .await;
    Ok(())
}

pub async fn mark_message_seen(
    state: &AppState,
    _conn: SubscriberId,
    user_id: String,
    message_id: Uuid,
) -> AppResult<()> {
    let user = IdentityService::resolve_or_create(&state.db, &user_id).await?;
    let entry = SeenEntry {
        id: user_id,
        name: user.display_name,
        avatar: user.avatar_url,
    };

    // Already at the watermark: nothing to broadcast.
    let Some(message) =
        MessageService::advance_seen_watermark(&state.db, message_id, entry).await?
    else {
        return Ok(());
    };

    MessageCache::rewrite(&state.redis, &message).await;
    state
        .registry
        .broadcast(
            &message.room(),
            &ServerEvent::MessageSeenUpdate {
                message_id,
                seen_users: message.seen_by.0.clone(),
            }
            .to_json(),
        )
        .await;
    Ok(())
}
