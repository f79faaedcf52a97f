use super::*;
use crate::frame::Status;
use crate::state::test_helpers;
use tokio::time::{Duration, timeout};

async fn recv_frame(rx: &mut mpsc::Receiver<Frame>) -> Frame {
    timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("frame receive timed out")
        .expect("channel closed")
}

// =============================================================================
// registry
// =============================================================================

#[tokio::test]
async fn register_and_unregister_track_count() {
    let state = test_helpers::test_app_state();
    let client_a = Uuid::new_v4();
    let client_b = Uuid::new_v4();
    let (tx_a, _rx_a) = mpsc::channel(8);
    let (tx_b, _rx_b) = mpsc::channel(8);

    assert_eq!(register(&state, client_a, tx_a).await, 1);
    assert_eq!(register(&state, client_b, tx_b).await, 2);
    assert_eq!(online_count(&state).await, 2);

    assert_eq!(unregister(&state, client_a).await, 1);
    assert_eq!(unregister(&state, client_a).await, 1);
    assert_eq!(unregister(&state, client_b).await, 0);
}

#[tokio::test]
async fn same_user_two_connections_counts_twice() {
    let state = test_helpers::test_app_state();
    let (tx_a, _rx_a) = mpsc::channel(8);
    let (tx_b, _rx_b) = mpsc::channel(8);

    // Connection-scoped: two tabs are two entries.
    register(&state, Uuid::new_v4(), tx_a).await;
    register(&state, Uuid::new_v4(), tx_b).await;
    assert_eq!(online_count(&state).await, 2);
}

// =============================================================================
// count frame
// =============================================================================

#[test]
fn count_frame_shape() {
    let frame = count_frame(7);
    assert_eq!(frame.syscall, "presence:online");
    assert_eq!(frame.status, Status::Request);
    assert_eq!(frame.data.get("count").and_then(serde_json::Value::as_i64), Some(7));
}

// =============================================================================
// broadcast
// =============================================================================

#[tokio::test]
async fn broadcast_count_reaches_all_clients() {
    let state = test_helpers::test_app_state();
    let mut rx_a = test_helpers::seed_client(&state, Uuid::new_v4()).await;
    let mut rx_b = test_helpers::seed_client(&state, Uuid::new_v4()).await;

    broadcast_count(&state).await;

    let a = recv_frame(&mut rx_a).await;
    let b = recv_frame(&mut rx_b).await;
    assert_eq!(a.syscall, "presence:online");
    assert_eq!(a.data.get("count").and_then(serde_json::Value::as_i64), Some(2));
    assert_eq!(b.data.get("count").and_then(serde_json::Value::as_i64), Some(2));
}

#[tokio::test]
async fn broadcast_count_after_disconnect_reports_remaining() {
    let state = test_helpers::test_app_state();
    let client_a = Uuid::new_v4();
    let mut rx_b = test_helpers::seed_client(&state, Uuid::new_v4()).await;
    let _rx_a = test_helpers::seed_client(&state, client_a).await;

    unregister(&state, client_a).await;
    broadcast_count(&state).await;

    let frame = recv_frame(&mut rx_b).await;
    assert_eq!(frame.data.get("count").and_then(serde_json::Value::as_i64), Some(1));
}
