//! Durable message store.
//!
//! Reaction and seen-receipt mutations are read-modify-write cycles over
//! the JSONB columns, run under `SELECT ... FOR UPDATE` so concurrent
//! updates to the same message serialize instead of clobbering each
//! other. The set semantics themselves live in [`crate::models::message`]
//! as plain functions.

use crate::error::{AppError, AppResult};
use crate::models::message::{add_reaction, already_seen, remove_reaction};
use crate::models::{Message, MessageFilter, NewMessage, Reaction, SeenEntry};
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use sqlx::{Pool, Postgres};
use std::collections::HashMap;
use uuid::Uuid;

/// Newest-first page size for history fetches.
pub const HISTORY_LIMIT: i64 = 50;
/// Messages stay editable for this long after creation.
pub const MAX_EDIT_MINUTES: i64 = 60;

const MESSAGE_COLUMNS: &str = "id, channel_id, conversation_id, sender_id, sender_name, \
     sender_avatar, recipient_id, content, message_type, attachment_url, edited, \
     reactions, seen_by, created_at";

pub struct MessageService;

impl MessageService {
    /// Append a message to its stream. Exactly one of channel and
    /// conversation must be set; the check constraint backs this up but
    /// the caller gets a clean error instead of a database one.
    pub async fn append(db: &Pool<Postgres>, new: NewMessage) -> AppResult<Message> {
        match (&new.channel_id, &new.conversation_id) {
            (Some(_), None) | (None, Some(_)) => {}
            _ => {
                return Err(AppError::BadRequest(
                    "message must target exactly one of channel or conversation".into(),
                ))
            }
        }
        if new.content.trim().is_empty() && new.attachment_url.is_none() {
            return Err(AppError::BadRequest("message content is required".into()));
        }

        Ok(sqlx::query_as::<_, Message>(&format!(
            r#"
            INSERT INTO messages
                (channel_id, conversation_id, sender_id, sender_name, sender_avatar,
                 recipient_id, content, message_type, attachment_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(new.channel_id)
        .bind(&new.conversation_id)
        .bind(&new.sender_id)
        .bind(&new.sender_name)
        .bind(&new.sender_avatar)
        .bind(&new.recipient_id)
        .bind(&new.content)
        .bind(new.message_type.as_str())
        .bind(&new.attachment_url)
        .fetch_one(db)
        .await?)
    }

    pub async fn get(db: &Pool<Postgres>, message_id: Uuid) -> AppResult<Message> {
        sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(message_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound("message"))
    }

    /// Most recent messages of a stream, newest first.
    pub async fn fetch_recent(
        db: &Pool<Postgres>,
        filter: &MessageFilter,
    ) -> AppResult<Vec<Message>> {
        match filter {
            MessageFilter::Channel(id) => Ok(sqlx::query_as::<_, Message>(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE channel_id = $1 \
                 ORDER BY created_at DESC LIMIT {HISTORY_LIMIT}"
            ))
            .bind(*id)
            .fetch_all(db)
            .await?),
            MessageFilter::Conversation(id) => Ok(sqlx::query_as::<_, Message>(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = $1 \
                 ORDER BY created_at DESC LIMIT {HISTORY_LIMIT}"
            ))
            .bind(id.clone())
            .fetch_all(db)
            .await?),
        }
    }

    /// Authoritative reaction and seen state for a batch of messages,
    /// used to overlay cached history so social data is never stale.
    pub async fn reaction_seen_state(
        db: &Pool<Postgres>,
        ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, (Vec<Reaction>, Vec<SeenEntry>)>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(Uuid, Json<Vec<Reaction>>, Json<Vec<SeenEntry>>)> =
            sqlx::query_as("SELECT id, reactions, seen_by FROM messages WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(db)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(id, reactions, seen_by)| (id, (reactions.0, seen_by.0)))
            .collect())
    }

    /// Edit message content. Only the sender may edit, and only within
    /// the edit window; edits mark the row so clients can badge it.
    pub async fn edit(
        db: &Pool<Postgres>,
        message_id: Uuid,
        editor_id: &str,
        new_content: &str,
    ) -> AppResult<Message> {
        if new_content.trim().is_empty() {
            return Err(AppError::BadRequest("edited content is required".into()));
        }

        let mut tx = db.begin().await?;
        let message = sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1 FOR UPDATE"
        ))
        .bind(message_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("message"))?;

        if message.sender_id != editor_id {
            return Err(AppError::Forbidden(
                "you can only edit your own messages".into(),
            ));
        }
        if !edit_window_open(message.created_at, Utc::now()) {
            return Err(AppError::EditWindowExpired {
                max_edit_minutes: MAX_EDIT_MINUTES,
            });
        }

        let updated = sqlx::query_as::<_, Message>(&format!(
            "UPDATE messages SET content = $1, edited = TRUE WHERE id = $2 \
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(new_content)
        .bind(message_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Add a (user, emoji) reaction. Returns the updated message; a
    /// duplicate pair is a no-op that still returns current state so the
    /// caller can re-broadcast idempotently.
    pub async fn add_reaction(
        db: &Pool<Postgres>,
        message_id: Uuid,
        user_id: &str,
        emoji: &str,
    ) -> AppResult<Message> {
        Self::mutate_reactions(db, message_id, |set| add_reaction(set, user_id, emoji)).await
    }

    /// Remove a (user, emoji) reaction. Removing an absent pair is a
    /// no-op.
    pub async fn remove_reaction(
        db: &Pool<Postgres>,
        message_id: Uuid,
        user_id: &str,
        emoji: &str,
    ) -> AppResult<Message> {
        Self::mutate_reactions(db, message_id, |set| remove_reaction(set, user_id, emoji)).await
    }

    async fn mutate_reactions<F>(
        db: &Pool<Postgres>,
        message_id: Uuid,
        apply: F,
    ) -> AppResult<Message>
    where
        F: FnOnce(&mut Vec<Reaction>) -> bool,
    {
        let mut tx = db.begin().await?;
        let mut message = sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1 FOR UPDATE"
        ))
        .bind(message_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("message"))?;

        if apply(&mut message.reactions.0) {
            sqlx::query("UPDATE messages SET reactions = $1 WHERE id = $2")
                .bind(Json(&message.reactions.0))
                .bind(message_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(message)
    }

    /// Advance a user's seen watermark to `message_id`. The user's entry
    /// is appended to the target message and retracted from every older
    /// message in the same stream, so at most one message per stream
    /// carries it. Returns `None` when the watermark is already there.
    pub async fn advance_seen_watermark(
        db: &Pool<Postgres>,
        message_id: Uuid,
        entry: SeenEntry,
    ) -> AppResult<Option<Message>> {
        let mut tx = db.begin().await?;
        let mut message = sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1 FOR UPDATE"
        ))
        .bind(message_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("message"))?;

        if already_seen(&message.seen_by.0, &entry.id) {
            tx.commit().await?;
            return Ok(None);
        }

        let user_id = entry.id.clone();
        message.seen_by.0.push(entry);
        sqlx::query("UPDATE messages SET seen_by = $1 WHERE id = $2")
            .bind(Json(&message.seen_by.0))
            .bind(message_id)
            .execute(&mut *tx)
            .await?;

        // Retract the user's entry from older messages in the stream.
        let retract = r#"
            UPDATE messages
            SET seen_by = (
                SELECT COALESCE(jsonb_agg(elem), '[]'::jsonb)
                FROM jsonb_array_elements(seen_by) elem
                WHERE elem->>'id' <> $1
            )
            WHERE created_at < $2
              AND seen_by @> jsonb_build_array(jsonb_build_object('id', $1::text))
        "#;
        match (&message.channel_id, &message.conversation_id) {
            (Some(channel_id), _) => {
                sqlx::query(&format!("{retract} AND channel_id = $3"))
                    .bind(&user_id)
                    .bind(message.created_at)
                    .bind(*channel_id)
                    .execute(&mut *tx)
                    .await?;
            }
            (None, Some(conversation_id)) => {
                sqlx::query(&format!("{retract} AND conversation_id = $3"))
                    .bind(&user_id)
                    .bind(message.created_at)
                    .bind(conversation_id.clone())
                    .execute(&mut *tx)
                    .await?;
            }
            (None, None) => {}
        }

        tx.commit().await?;
        Ok(Some(message))
    }
}

/// A message may be edited until exactly the window boundary; one tick
/// past it is rejected.
fn edit_window_open(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - created_at <= Duration::minutes(MAX_EDIT_MINUTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_allowed_inside_window() {
        let now = Utc::now();
        assert!(edit_window_open(now - Duration::minutes(59), now));
        assert!(edit_window_open(now, now));
    }

    #[test]
    fn edit_rejected_at_window_boundary() {
        let now = Utc::now();
        assert!(edit_window_open(now - Duration::minutes(MAX_EDIT_MINUTES), now));
        assert!(!edit_window_open(
            now - Duration::minutes(MAX_EDIT_MINUTES) - Duration::seconds(1),
            now
        ));
    }
}
