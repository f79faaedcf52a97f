//! Chat REST routes — history fetch and message append.
//!
//! The websocket path in `routes::ws` is the live relay; these endpoints
//! mirror it for clients that poll.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;

use super::auth::AuthUser;
use crate::frame::now_ms;
use crate::services::chat::{self, MessageRow};
use crate::state::AppState;

pub(crate) fn chat_error_to_status(err: &chat::ChatError) -> StatusCode {
    use chat::ChatError;
    match err {
        ChatError::UnknownGroup(_) => StatusCode::NOT_FOUND,
        ChatError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// `GET /api/chat/messages` — recent community-room history, oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<MessageRow>>, (StatusCode, String)> {
    let messages = chat::recent_messages(&state.pool, chat::HISTORY_LIMIT)
        .await
        .map_err(|e| (chat_error_to_status(&e), e.to_string()))?;
    Ok(Json(messages))
}

#[derive(Deserialize)]
pub struct PostMessageBody {
    message: String,
}

/// `POST /api/chat/messages` — append a message without a live socket.
pub async fn post_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<PostMessageBody>,
) -> Result<(StatusCode, Json<MessageRow>), (StatusCode, String)> {
    let text = chat::validate_body(&body.message).map_err(|e| (chat_error_to_status(&e), e.to_string()))?;

    if let Err(e) = state.rate_limiter.check_chat_send(auth.user.id) {
        return Err((StatusCode::TOO_MANY_REQUESTS, e.to_string()));
    }

    let row = chat::persist_message(&state.pool, auth.user.id, &auth.user.name, text, now_ms())
        .await
        .map_err(|e| (chat_error_to_status(&e), e.to_string()))?;
    Ok((StatusCode::CREATED, Json(row)))
}
