//! Chat service — group room membership, broadcast, message persistence.
//!
//! DESIGN
//! ======
//! There is one community room. Membership is in-memory only; messages are
//! written to Postgres as they pass through and history is served from there.
//! Broadcast is a thin relay over bounded per-client channels with no
//! ordering or delivery guarantee beyond the message timestamp.

use sqlx::{PgPool, Row};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::frame::Frame;
use crate::state::{AppState, ConnectedUser};

/// The single fixed community room every authenticated user may join.
pub const GROUP_ID: &str = "travel-group";

/// Messages returned on join and on history requests.
pub const HISTORY_LIMIT: i64 = 100;

const MAX_MESSAGE_LEN: usize = 2000;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("unknown group: {0}")]
    UnknownGroup(String),
    #[error("must join the group first")]
    NotJoined,
    #[error("message must not be empty")]
    EmptyMessage,
    #[error("message exceeds {MAX_MESSAGE_LEN} characters")]
    MessageTooLong,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for ChatError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownGroup(_) => "E_UNKNOWN_GROUP",
            Self::NotJoined => "E_NOT_JOINED",
            Self::EmptyMessage => "E_EMPTY_MESSAGE",
            Self::MessageTooLong => "E_MESSAGE_TOO_LONG",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MessageRow {
    pub id: Uuid,
    pub group_id: String,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub body: String,
    /// Milliseconds since Unix epoch, client-facing ordering heuristic.
    pub ts: i64,
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Check that a requested group id names the community room. A missing id
/// defaults to it.
pub fn resolve_group(group_id: Option<&str>) -> Result<&'static str, ChatError> {
    match group_id {
        None => Ok(GROUP_ID),
        Some(id) if id == GROUP_ID => Ok(GROUP_ID),
        Some(other) => Err(ChatError::UnknownGroup(other.to_owned())),
    }
}

pub fn validate_body(body: &str) -> Result<&str, ChatError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    if trimmed.chars().count() > MAX_MESSAGE_LEN {
        return Err(ChatError::MessageTooLong);
    }
    Ok(trimmed)
}

// =============================================================================
// JOIN / PART
// =============================================================================

/// Join the community room. Idempotent: re-joining replaces the sender.
pub async fn join_room(state: &AppState, client_id: Uuid, user_id: Uuid, user_name: &str, tx: mpsc::Sender<Frame>) {
    let mut room = state.room.write().await;
    room.members.insert(client_id, tx);
    room.users
        .insert(client_id, ConnectedUser { user_id, user_name: user_name.to_owned() });
    info!(%client_id, %user_id, members = room.members.len(), "client joined room");
}

/// Leave the community room. A no-op if the client never joined.
pub async fn part_room(state: &AppState, client_id: Uuid) {
    let mut room = state.room.write().await;
    if room.members.remove(&client_id).is_some() {
        room.users.remove(&client_id);
        info!(%client_id, remaining = room.members.len(), "client left room");
    }
}

/// Whether a connection has joined the room.
pub async fn is_member(state: &AppState, client_id: Uuid) -> bool {
    state.room.read().await.members.contains_key(&client_id)
}

/// Identities of everyone currently in the room, keyed by connection.
pub async fn room_members(state: &AppState) -> Vec<ConnectedUser> {
    state.room.read().await.users.values().cloned().collect()
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Broadcast a frame to all room members, optionally excluding one.
pub async fn broadcast(state: &AppState, frame: &Frame, exclude: Option<Uuid>) {
    let room = state.room.read().await;
    for (client_id, tx) in &room.members {
        if exclude == Some(*client_id) {
            continue;
        }
        // Best-effort: if a client's channel is full, skip it.
        let _ = tx.try_send(frame.clone());
    }
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Append a message to the store and return the persisted row.
pub async fn persist_message(
    pool: &PgPool,
    sender_id: Uuid,
    sender_name: &str,
    body: &str,
    ts: i64,
) -> Result<MessageRow, ChatError> {
    let id: Uuid = sqlx::query_scalar(
        r"INSERT INTO messages (group_id, sender_id, sender_name, body, ts)
          VALUES ($1, $2, $3, $4, $5)
          RETURNING id",
    )
    .bind(GROUP_ID)
    .bind(sender_id)
    .bind(sender_name)
    .bind(body)
    .bind(ts)
    .fetch_one(pool)
    .await?;

    Ok(MessageRow {
        id,
        group_id: GROUP_ID.to_owned(),
        sender_id,
        sender_name: sender_name.to_owned(),
        body: body.to_owned(),
        ts,
    })
}

/// Fetch the most recent messages in chronological order.
pub async fn recent_messages(pool: &PgPool, limit: i64) -> Result<Vec<MessageRow>, ChatError> {
    let rows = sqlx::query(
        r"SELECT id, group_id, sender_id, sender_name, body, ts
          FROM (
              SELECT id, group_id, sender_id, sender_name, body, ts
              FROM messages
              WHERE group_id = $1
              ORDER BY ts DESC
              LIMIT $2
          ) recent
          ORDER BY ts ASC",
    )
    .bind(GROUP_ID)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|r| MessageRow {
            id: r.get("id"),
            group_id: r.get("group_id"),
            sender_id: r.get("sender_id"),
            sender_name: r.get("sender_name"),
            body: r.get("body"),
            ts: r.get("ts"),
        })
        .collect())
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
