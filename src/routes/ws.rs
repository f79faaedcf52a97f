//! WebSocket handler — chat relay and presence edge broadcasts.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by syscall prefix
//! - Broadcast frames from room peers → forward to client
//!
//! Handler functions are pure business logic — they validate, mutate state,
//! and return an `Outcome`. The dispatch layer owns all outbound concerns:
//! reply to sender and broadcast to peers.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → register presence → `session:connected` with `client_id`
//!    → `presence:online` pushed to everyone
//! 2. Client sends frames → dispatch → handler returns Outcome
//! 3. Dispatch applies Outcome (reply / broadcast / both)
//! 4. Close → part room → unregister presence → `presence:online` again

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, Frame, now_ms};
use crate::services::session::SessionUser;
use crate::services::{chat, presence, session};
use crate::state::AppState;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what — handlers never send frames directly.
enum Outcome {
    /// Broadcast done+data to ALL room members including sender.
    /// Sender's copy carries `parent_id` for correlation.
    Broadcast(Data),
    /// Send done+data to sender only.
    Reply(Data),
    /// Stream item frames to the sender, then a terminal done.
    ReplyItems { items: Vec<Data>, done: Data },
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(ticket) = params.get("ticket") else {
        return (StatusCode::UNAUTHORIZED, "ticket required").into_response();
    };

    let user = match session::consume_ws_ticket(&state.pool, ticket).await {
        Ok(Some(user)) => user,
        Ok(None) => return (StatusCode::UNAUTHORIZED, "invalid or expired ticket").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "ws ticket validation failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "ticket validation error").into_response();
        }
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, user))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, user: SessionUser) {
    let client_id = Uuid::new_v4();

    // Per-connection channel for receiving broadcast frames from peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(256);

    // Register presence before the welcome so the pushed count includes us.
    presence::register(&state, client_id, client_tx.clone()).await;
    presence::broadcast_count(&state).await;

    let welcome = Frame::request("session:connected", Data::new())
        .with_data("client_id", client_id.to_string())
        .with_data("user_id", user.id.to_string())
        .with_data("name", user.name.clone());
    if send_frame(&mut socket, &welcome).await.is_err() {
        presence::unregister(&state, client_id).await;
        presence::broadcast_count(&state).await;
        return;
    }

    info!(%client_id, user_id = %user.id, "ws: client connected");

    // Whether this connection has joined the community room.
    let mut joined = false;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let sender_frames =
                            process_inbound_text(&state, &mut joined, client_id, &user, &client_tx, &text).await;
                        for frame in sender_frames {
                            let _ = send_frame(&mut socket, &frame).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    if joined {
        chat::part_room(&state, client_id).await;
    }
    presence::unregister(&state, client_id).await;
    presence::broadcast_count(&state).await;
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
///
/// This keeps the websocket transport concerns separate from frame handling,
/// so tests can exercise dispatch and broadcast behavior end-to-end.
async fn process_inbound_text(
    state: &AppState,
    joined: &mut bool,
    client_id: Uuid,
    user: &SessionUser,
    client_tx: &mpsc::Sender<Frame>,
    text: &str,
) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    // Stamp the authenticated user_id as `from` and default chat frames onto
    // the community room so replies carry the group.
    req = req.with_from(user.id.to_string());
    if req.prefix() == "chat" && req.group_id.is_none() {
        req = req.with_group_id(chat::GROUP_ID);
    }

    info!(%client_id, id = %req.id, syscall = %req.syscall, status = ?req.status, "ws: recv frame");

    // Dispatch to handler — returns Outcome or error Frame.
    let result = match req.prefix() {
        "chat" => handle_chat(state, joined, client_id, user, client_tx, &req).await,
        "presence" => handle_presence(state, &req).await,
        prefix => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    // Apply outcome — the dispatch layer owns all outbound logic.
    match result {
        Ok(Outcome::Broadcast(data)) => {
            let sender_frame = req.done_with(data);
            // Peers get a copy without parent_id (they didn't originate the request).
            let mut peer_frame = sender_frame.clone();
            peer_frame.id = Uuid::new_v4();
            peer_frame.parent_id = None;
            chat::broadcast(state, &peer_frame, Some(client_id)).await;
            vec![sender_frame]
        }
        Ok(Outcome::Reply(data)) => {
            vec![req.done_with(data)]
        }
        Ok(Outcome::ReplyItems { items, done }) => {
            let mut frames: Vec<Frame> = items.into_iter().map(|data| req.item(data)).collect();
            if done.is_empty() {
                frames.push(req.done());
            } else {
                frames.push(req.done_with(done));
            }
            frames
        }
        Err(err_frame) => {
            vec![err_frame]
        }
    }
}

// =============================================================================
// CHAT HANDLERS
// =============================================================================

async fn handle_chat(
    state: &AppState,
    joined: &mut bool,
    client_id: Uuid,
    user: &SessionUser,
    client_tx: &mpsc::Sender<Frame>,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let op = req.syscall.split_once(':').map_or("", |(_, op)| op);

    let group_id = match chat::resolve_group(req.group_id.as_deref()) {
        Ok(g) => g,
        Err(e) => return Err(req.error_from(&e)),
    };

    match op {
        "join" => {
            chat::join_room(state, client_id, user.id, &user.name, client_tx.clone()).await;
            *joined = true;

            match chat::recent_messages(&state.pool, chat::HISTORY_LIMIT).await {
                Ok(messages) => {
                    let members: Vec<serde_json::Value> = chat::room_members(state)
                        .await
                        .iter()
                        .map(|m| serde_json::json!({ "user_id": m.user_id, "name": m.user_name }))
                        .collect();

                    let mut done = Data::new();
                    done.insert("group_id".into(), serde_json::json!(group_id));
                    done.insert("members".into(), serde_json::json!(members));
                    done.insert("online".into(), serde_json::json!(presence::online_count(state).await));
                    Ok(Outcome::ReplyItems { items: messages.iter().map(message_data).collect(), done })
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "send" => {
            if !*joined {
                return Err(req.error_from(&chat::ChatError::NotJoined));
            }

            let body = req
                .data
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let body = match chat::validate_body(body) {
                Ok(b) => b,
                Err(e) => return Err(req.error_from(&e)),
            };

            if let Err(e) = state.rate_limiter.check_chat_send(user.id) {
                return Err(req.error_from(&e));
            }

            match chat::persist_message(&state.pool, user.id, &user.name, body, now_ms()).await {
                Ok(message) => Ok(Outcome::Broadcast(message_data(&message))),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "history" => match chat::recent_messages(&state.pool, chat::HISTORY_LIMIT).await {
            Ok(messages) => Ok(Outcome::ReplyItems {
                items: messages.iter().map(message_data).collect(),
                done: Data::new(),
            }),
            Err(e) => Err(req.error_from(&e)),
        },
        _ => Err(req.error(format!("unknown chat op: {op}"))),
    }
}

fn message_data(message: &chat::MessageRow) -> Data {
    let mut data = Data::new();
    data.insert("id".into(), serde_json::json!(message.id));
    data.insert("group_id".into(), serde_json::json!(message.group_id));
    data.insert("sender_id".into(), serde_json::json!(message.sender_id));
    data.insert("sender_name".into(), serde_json::json!(message.sender_name));
    data.insert("message".into(), serde_json::json!(message.body));
    data.insert("ts".into(), serde_json::json!(message.ts));
    data
}

// =============================================================================
// PRESENCE HANDLER
// =============================================================================

async fn handle_presence(state: &AppState, req: &Frame) -> Result<Outcome, Frame> {
    let op = req.syscall.split_once(':').map_or("", |(_, op)| op);

    match op {
        "count" => {
            let mut data = Data::new();
            data.insert("count".into(), serde_json::json!(presence::online_count(state).await));
            Ok(Outcome::Reply(data))
        }
        _ => Err(req.error(format!("unknown presence op: {op}"))),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == crate::frame::Status::Error {
        let code = frame
            .data
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        let message = frame
            .data
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
