//! Presence transitions and lookups.
//!
//! Every transition fans out twice: a targeted `user_presence_updated`
//! followed by a recomputed `all_users_presence` snapshot, both to all
//! live connections.

use crate::error::AppResult;
use crate::keys;
use crate::services::identity_service::IdentityService;
use crate::services::presence_service::{PresenceService, STATUS_OFFLINE, STATUS_ONLINE};
use crate::state::AppState;
use crate::websocket::events::ServerEvent;
use crate::websocket::SubscriberId;
use chrono::Utc;

pub async fn user_online(
    state: &AppState,
    conn: SubscriberId,
    user_id: String,
    eth_address: Option<String>,
) -> AppResult<()> {
    let user = IdentityService::resolve_or_create(&state.db, &user_id).await?;
    if let Some(address) = &eth_address {
        IdentityService::attach_chain_address(&state.db, &user, address).await?;
    }

    state
        .registry
        .join(&keys::personal_room(&user_id), conn)
        .await;
    PresenceService::set_online(&state.redis, &user_id).await?;

    state
        .registry
        .broadcast_all(
            &ServerEvent::UserPresenceUpdated {
                user_id,
                status: STATUS_ONLINE.into(),
                last_seen: None,
            }
            .to_json(),
        )
        .await;
    broadcast_snapshot(state).await
}

/// Disconnect path; the session calls this for the identity the
/// connection announced.
pub async fn user_offline(state: &AppState, identifier: &str) -> AppResult<()> {
    PresenceService::set_offline(&state.redis, identifier).await?;

    state
        .registry
        .broadcast_all(
            &ServerEvent::UserPresenceUpdated {
                user_id: identifier.to_string(),
                status: STATUS_OFFLINE.into(),
                last_seen: Some(Utc::now().timestamp()),
            }
            .to_json(),
        )
        .await;
    broadcast_snapshot(state).await
}

async fn broadcast_snapshot(state: &AppState) -> AppResult<()> {
    let users = PresenceService::snapshot(&state.redis).await?;
    state
        .registry
        .broadcast_all(&ServerEvent::AllUsersPresence { users }.to_json())
        .await;
    Ok(())
}

pub async fn check_user_presence(
    state: &AppState,
    conn: SubscriberId,
    user_id: String,
) -> AppResult<()> {
    let entry = PresenceService::get(&state.redis, &user_id).await?;
    state
        .registry
        .send_to(
            conn,
            &ServerEvent::UserPresenceStatus {
                user_id,
                status: entry.status,
                last_seen: entry.last_seen,
            }
            .to_json(),
        )
        .await;
    Ok(())
}

pub async fn join_user_room(
    state: &AppState,
    conn: SubscriberId,
    user_id: String,
) -> AppResult<()> {
    state
        .registry
        .join(&keys::personal_room(&user_id), conn)
        .await;
    Ok(())
}
