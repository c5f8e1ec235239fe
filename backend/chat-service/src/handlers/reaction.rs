//! Reaction add/remove. Both paths re-broadcast the full reaction set so
//! clients replace state instead of patching it.

use crate::error::AppResult;
use crate::models::Message;
use crate::services::identity_service::IdentityService;
use crate::services::message_cache::MessageCache;
use crate::services::message_service::MessageService;
use crate::state::AppState;
use crate::websocket::events::ServerEvent;
use crate::websocket::SubscriberId;
use uuid::Uuid;

pub async fn add_reaction(
    state: &AppState,
    _conn: SubscriberId,
    message_id: Uuid,
    emoji: String,
    user_id: String,
) -> AppResult<()> {
    IdentityService::resolve_or_create(&state.db, &user_id).await?;
    let message = MessageService::add_reaction(&state.db, message_id, &user_id, &emoji).await?;
    broadcast_reactions(state, message_id, message).await
}

pub async fn remove_reaction(
    state: &AppState,
    _conn: SubscriberId,
    message_id: Uuid,
    emoji: String,
    user_id: String,
) -> AppResult<()> {
    IdentityService::resolve_or_create(&state.db, &user_id).await?;
    let message = MessageService::remove_reaction(&state.db, message_id, &user_id, &emoji).await?;
    broadcast_reactions(state, message_id, message).await
}

async fn broadcast_reactions(
    state: &AppState,
    message_id: Uuid,
    message: Message,
) -> AppResult<()> {
    MessageCache::rewrite(&state.redis, &message).await;
    state
        .registry
        .broadcast(
            &message.room(),
            &ServerEvent::ReactionUpdated {
                message_id,
                reactions: message.reactions.0.clone(),
            }
            .to_json(),
        )
        .await;
    Ok(())
}
