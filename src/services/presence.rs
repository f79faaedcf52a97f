//! Presence service — connected-socket tracking and count broadcast.
//!
//! DESIGN
//! ======
//! Presence is connection-scoped: a user with two tabs counts twice. The
//! count is pushed to every connected client on connect and disconnect, and
//! a background task re-broadcasts it on an interval so clients that missed
//! an edge converge anyway.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::frame::{Data, Frame};
use crate::state::AppState;

const DEFAULT_PRESENCE_BROADCAST_SECS: u64 = 30;

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

// =============================================================================
// CONNECTION REGISTRY
// =============================================================================

/// Register a connected socket. Returns the new online count.
pub async fn register(state: &AppState, client_id: Uuid, tx: mpsc::Sender<Frame>) -> usize {
    let mut clients = state.clients.write().await;
    clients.insert(client_id, tx);
    clients.len()
}

/// Remove a disconnected socket. Returns the new online count.
pub async fn unregister(state: &AppState, client_id: Uuid) -> usize {
    let mut clients = state.clients.write().await;
    clients.remove(&client_id);
    clients.len()
}

/// Current number of connected sockets.
pub async fn online_count(state: &AppState) -> usize {
    state.clients.read().await.len()
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Build the `presence:online` frame carrying the current count.
#[must_use]
pub fn count_frame(count: usize) -> Frame {
    let mut data = Data::new();
    data.insert("count".into(), serde_json::json!(count));
    Frame::request("presence:online", data)
}

/// Push the current online count to every connected client.
pub async fn broadcast_count(state: &AppState) {
    let clients = state.clients.read().await;
    let frame = count_frame(clients.len());
    for tx in clients.values() {
        // Best-effort: a full channel just misses one tick.
        let _ = tx.try_send(frame.clone());
    }
}

/// Spawn the periodic count re-broadcast task. Returns a handle for shutdown.
pub fn spawn_presence_task(state: AppState) -> JoinHandle<()> {
    let interval_secs = env_parse("PRESENCE_BROADCAST_SECS", DEFAULT_PRESENCE_BROADCAST_SECS);
    info!(interval_secs, "presence broadcast configured");
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(interval_secs)).await;
            broadcast_count(&state).await;
        }
    })
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
