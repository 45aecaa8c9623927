use super::*;
use crate::state::test_helpers::{seed_member, test_app_state};
use serde_json::json;
use tokio::time::{Duration, timeout};

fn pixel_frame() -> Frame {
    let mut frame = crate::frame::request("pixel", json!({"x": 5, "y": 5, "colorIndex": 3, "owner": "A"}));
    frame.board_id = Some(1);
    frame
}

#[tokio::test]
async fn join_unknown_board_is_rejected() {
    let (state, _) = test_app_state().await;
    let (tx, _rx) = mpsc::channel(4);
    let err = join(&state, 99, Uuid::new_v4(), "k", json!({}), tx)
        .await
        .expect_err("unknown board");
    assert!(matches!(err, ChannelError::BoardNotFound(99)));
    assert!(state.channels.read().await.is_empty());
}

#[tokio::test]
async fn join_counts_members() {
    let (state, _) = test_app_state().await;
    let (tx_a, _rx_a) = mpsc::channel(4);
    let (tx_b, _rx_b) = mpsc::channel(4);
    assert_eq!(join(&state, 1, Uuid::new_v4(), "a", json!({}), tx_a).await.expect("a"), 1);
    assert_eq!(join(&state, 1, Uuid::new_v4(), "b", json!({}), tx_b).await.expect("b"), 2);
}

#[tokio::test]
async fn broadcast_excludes_sender() {
    let (state, _) = test_app_state().await;
    let (a, mut rx_a) = seed_member(&state, 1, "a").await;
    let (_b, mut rx_b) = seed_member(&state, 1, "b").await;

    let delivered = broadcast(&state, 1, &pixel_frame(), Some(a)).await;
    assert_eq!(delivered, 1);

    let got = timeout(Duration::from_millis(200), rx_b.recv())
        .await
        .expect("timed out")
        .expect("closed");
    assert_eq!(got.event, "pixel");
    assert!(rx_a.try_recv().is_err());
}

#[tokio::test]
async fn broadcast_stays_on_its_board() {
    let (state, _) = test_app_state().await;
    let (a, _rx_a) = seed_member(&state, 1, "a").await;
    let (_c, mut rx_c) = seed_member(&state, 2, "c").await;

    assert_eq!(broadcast(&state, 1, &pixel_frame(), Some(a)).await, 0);
    assert!(rx_c.try_recv().is_err());
}

#[tokio::test]
async fn full_queue_only_costs_that_member() {
    let (state, _) = test_app_state().await;
    let (tx_slow, mut rx_slow) = mpsc::channel(1);
    join(&state, 1, Uuid::new_v4(), "slow", json!({}), tx_slow)
        .await
        .expect("join");
    let (_fast, mut rx_fast) = seed_member(&state, 1, "fast").await;

    assert_eq!(broadcast(&state, 1, &pixel_frame(), None).await, 2);
    assert_eq!(broadcast(&state, 1, &pixel_frame(), None).await, 1);
    assert!(rx_slow.try_recv().is_ok());
    assert!(rx_slow.try_recv().is_err());
    assert!(rx_fast.try_recv().is_ok());
    assert!(rx_fast.try_recv().is_ok());
}

#[tokio::test]
async fn part_removes_member_and_empty_board() {
    let (state, _) = test_app_state().await;
    let (a, _rx) = seed_member(&state, 1, "a").await;
    part(&state, 1, a).await;
    assert!(state.channels.read().await.get(&1).is_none());
    // Parting twice is harmless.
    part(&state, 1, a).await;
}

#[tokio::test]
async fn track_replaces_meta() {
    let (state, _) = test_app_state().await;
    let (a, _rx) = seed_member(&state, 1, "a").await;
    assert!(track(&state, 1, a, json!({"name": "Ann"})).await);
    assert_eq!(members(&state, 1).await, vec![("a".to_owned(), json!({"name": "Ann"}))]);
    assert!(!track(&state, 2, a, json!({})).await);
}
