//! Per-connection session loop.
//!
//! Each socket registers with the connection registry, then pumps two
//! directions concurrently: registry multicasts out to the socket, and
//! inbound frames through the event dispatcher. A handler failure is an
//! `error` event to this connection only; room traffic never sees it.

use crate::error::AppError;
use crate::handlers;
use crate::state::AppState;
use crate::websocket::events::{ClientEvent, ServerEvent};
use crate::websocket::SubscriberId;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, state))
}

async fn run_session(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (conn, mut outbound) = state.registry.connect().await;
    tracing::debug!(?conn, "websocket connected");

    // Identity announced via user_online/join_user_room; drives the
    // offline transition when the socket drops.
    let mut announced: Option<String> = None;

    loop {
        tokio::select! {
            msg = outbound.recv() => {
                let Some(msg) = msg else { break };
                if sink.send(WsMessage::Text(msg.into())).await.is_err() {
                    break;
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_frame(&state, conn, text.as_str(), &mut announced).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.registry.disconnect(conn).await;
    tracing::debug!(?conn, "websocket disconnected");

    if let Some(identifier) = announced {
        if let Err(e) = handlers::presence::user_offline(&state, &identifier).await {
            tracing::warn!(%identifier, error = %e, "offline transition failed");
        }
    }
}

async fn handle_frame(
    state: &AppState,
    conn: SubscriberId,
    text: &str,
    announced: &mut Option<String>,
) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable client event");
            let reply = ServerEvent::Error {
                message: "unrecognized event".into(),
            };
            state.registry.send_to(conn, &reply.to_json()).await;
            return;
        }
    };

    match &event {
        ClientEvent::UserOnline { user_id, .. } | ClientEvent::JoinUserRoom { user_id } => {
            *announced = Some(user_id.clone());
        }
        _ => {}
    }

    if let Err(e) = dispatch(state, conn, event).await {
        match &e {
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal => {
                tracing::error!(error = %e, "event handler failed");
            }
            other => tracing::warn!(error = %other, "event rejected"),
        }
        let reply = ServerEvent::Error {
            message: e.client_message(),
        };
        state.registry.send_to(conn, &reply.to_json()).await;
    }
}

async fn dispatch(
    state: &AppState,
    conn: SubscriberId,
    event: ClientEvent,
) -> Result<(), AppError> {
    match event {
        ClientEvent::JoinChannel {
            channel_id,
            user_id,
        } => handlers::channel::join_channel(state, conn, channel_id, user_id).await,
        ClientEvent::LeaveChannel {
            channel_id,
            user_id,
        } => handlers::channel::leave_channel(state, conn, channel_id, user_id).await,
        ClientEvent::SendMessage {
            channel_id,
            user_id,
            content,
            message_type,
            attachment_data,
        } => {
            handlers::channel::send_message(
                state,
                conn,
                channel_id,
                user_id,
                content,
                message_type,
                attachment_data,
            )
            .await
        }
        ClientEvent::JoinDm {
            conversation_id,
            user_id,
        } => handlers::dm::join_dm(state, conn, conversation_id, user_id).await,
        ClientEvent::SendDm {
            sender_id,
            recipient_id,
            content,
            message_type,
            conversation_id,
            attachment_data,
        } => {
            handlers::dm::send_dm(
                state,
                conn,
                sender_id,
                recipient_id,
                content,
                message_type,
                conversation_id,
                attachment_data,
            )
            .await
        }
        ClientEvent::LeaveDm { conversation_id } => {
            handlers::dm::leave_dm(state, conn, conversation_id).await
        }
        ClientEvent::AddReaction {
            message_id,
            emoji,
            user_id,
        } => handlers::reaction::add_reaction(state, conn, message_id, emoji, user_id).await,
        ClientEvent::RemoveReaction {
            message_id,
            emoji,
            user_id,
        } => handlers::reaction::remove_reaction(state, conn, message_id, emoji, user_id).await,
        ClientEvent::EditMessage {
            message_id,
            new_content,
            user_id,
            ..
        } => handlers::message::edit_message(state, conn, message_id, new_content, user_id).await,
        ClientEvent::MarkMessageSeen {
            user_id,
            message_id,
            ..
        } => handlers::message::mark_message_seen(state, conn, user_id, message_id).await,
        ClientEvent::Typing {
            user_id,
            channel_id,
            conversation_id,
        } => handlers::typing::typing(state, conn, user_id, channel_id, conversation_id).await,
        ClientEvent::StopTyping {
            user_id,
            channel_id,
            conversation_id,
        } => handlers::typing::stop_typing(state, conn, user_id, channel_id, conversation_id).await,
        ClientEvent::UserOnline {
            user_id,
            eth_address,
        } => handlers::presence::user_online(state, conn, user_id, eth_address).await,
        ClientEvent::MessageRead {
            user_id,
            channel_id,
            conversation_id,
        } => handlers::unread::message_read(state, conn, user_id, channel_id, conversation_id).await,
        ClientEvent::FetchUnreadCounts { user_id } => {
            handlers::unread::fetch_unread_counts(state, conn, user_id).await
        }
        ClientEvent::JoinUserRoom { user_id } => {
            handlers::presence::join_user_room(state, conn, user_id).await
        }
        ClientEvent::CheckUserPresence { user_id } => {
            handlers::presence::check_user_presence(state, conn, user_id).await
        }
        ClientEvent::CreateGroup {
            name,
            description,
            created_by,
            is_private,
            members,
            avatar_url,
        } => {
            handlers::group::create_group(
                state,
                conn,
                name,
                description,
                created_by,
                is_private,
                members,
                avatar_url,
            )
            .await
        }
        ClientEvent::AddGroupMember {
            group_id,
            user_id,
            member_ids,
        } => handlers::group::add_group_member(state, conn, group_id, user_id, member_ids).await,
        ClientEvent::GetUserGroups { user_id } => {
            handlers::group::get_user_groups(state, conn, user_id).await
        }
        ClientEvent::GetGroupMembers { group_id } => {
            handlers::group::get_group_members(state, conn, group_id).await
        }
    }
}
