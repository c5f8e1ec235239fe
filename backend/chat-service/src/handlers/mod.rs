//! Event handlers, one module per event family. Every handler resolves
//! identities at its boundary, talks to services, and multicasts results
//! through the connection registry; failures bubble up to the session,
//! which reports them to the originating connection only.

pub mod channel;
pub mod dm;
pub mod group;
pub mod message;
pub mod presence;
pub mod reaction;
pub mod typing;
pub mod unread;

use crate::error::{AppError, AppResult};
use crate::models::{Message, MessageFilter};
use crate::services::message_cache::MessageCache;
use crate::services::message_service::MessageService;
use crate::state::AppState;
use crate::websocket::events::AttachmentUpload;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// History for a stream, served from cache when warm. Reaction and seen
/// state on cached entries is re-read from the store; a missed in-place
/// rewrite must never serve stale social data.
pub(crate) async fn load_history(
    state: &AppState,
    filter: &MessageFilter,
) -> AppResult<Vec<Message>> {
    if let Some(mut cached) = MessageCache::get(&state.redis, filter).await {
        let ids: Vec<_> = cached.iter().map(|m| m.id).collect();
        let fresh = MessageService::reaction_seen_state(&state.db, &ids).await?;
        crate::models::message::refresh_social_state(&mut cached, &fresh);
        return Ok(cached);
    }
    let messages = MessageService::fetch_recent(&state.db, filter).await?;
    MessageCache::fill(&state.redis, filter, &messages).await;
    Ok(messages)
}

/// Decode an inline base64 attachment and upload it, returning the
/// public URL.
pub(crate) async fn store_attachment(
    state: &AppState,
    upload: &AttachmentUpload,
) -> AppResult<String> {
    let Some(store) = &state.blob_store else {
        return Err(AppError::BadRequest(
            "attachment uploads are not configured".into(),
        ));
    };

    // Accept both bare base64 and data-URL payloads.
    let encoded = match upload.data.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => upload.data.as_str(),
    };
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| AppError::BadRequest("attachment data is not valid base64".into()))?;
    if bytes.is_empty() {
        return Err(AppError::BadRequest("attachment data is empty".into()));
    }

    store
        .store(&upload.file_path, bytes, &upload.mime_type)
        .await
}
