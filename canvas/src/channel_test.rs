use serde_json::json;

use super::*;
use crate::event::{ActiveEvent, PixelEvent};

fn pixel(x: i64) -> ChannelEvent {
    ChannelEvent::Pixel(PixelEvent { x, y: 5, color_index: 3, owner: Some("A".into()), sender: None })
}

#[tokio::test]
async fn sender_does_not_receive_its_own_broadcast() {
    let hub = LocalHub::new();
    let mut a = hub.subscribe(1, "a", json!({})).await.expect("a");
    let mut b = hub.subscribe(1, "b", json!({})).await.expect("b");

    a.send(&pixel(5));
    assert_eq!(b.recv().await, Some(pixel(5)));
    assert_eq!(a.try_recv(), None);
}

#[tokio::test]
async fn scopes_are_isolated_per_board() {
    let hub = LocalHub::new();
    let a = hub.subscribe(1, "a", json!({})).await.expect("a");
    let mut other = hub.subscribe(2, "c", json!({})).await.expect("c");

    a.send(&pixel(1));
    assert_eq!(other.try_recv(), None);
    assert_eq!(a.name(), "board-1");
}

#[tokio::test]
async fn drop_releases_membership() {
    let hub = LocalHub::new();
    let a = hub.subscribe(1, "a", json!({})).await.expect("a");
    {
        let _b = hub.subscribe(1, "b", json!({})).await.expect("b");
        assert_eq!(hub.member_count(1), 2);
    }
    assert_eq!(hub.member_count(1), 1);
    drop(a);
    assert_eq!(hub.member_count(1), 0);
}

#[tokio::test]
async fn released_subscription_stops_sending() {
    let hub = LocalHub::new();
    let mut a = hub.subscribe(1, "a", json!({})).await.expect("a");
    let mut b = hub.subscribe(1, "b", json!({})).await.expect("b");

    a.release();
    assert!(a.is_released());
    a.send(&pixel(1));
    assert_eq!(b.try_recv(), None);
    // Releasing again is harmless.
    a.release();
    assert_eq!(hub.member_count(1), 1);
}

#[tokio::test]
async fn late_joiner_gets_no_backlog() {
    let hub = LocalHub::new();
    let a = hub.subscribe(1, "a", json!({})).await.expect("a");
    a.send(&pixel(1));
    let mut late = hub.subscribe(1, "late", json!({})).await.expect("late");
    assert_eq!(late.try_recv(), None);
}

#[tokio::test]
async fn full_queue_drops_events_for_that_peer_only() {
    let hub = LocalHub::with_capacity(1);
    let a = hub.subscribe(1, "a", json!({})).await.expect("a");
    let mut slow = hub.subscribe(1, "slow", json!({})).await.expect("slow");

    a.send(&pixel(1));
    a.send(&pixel(2));
    assert_eq!(slow.try_recv(), Some(pixel(1)));
    assert_eq!(slow.try_recv(), None);

    a.send(&pixel(3));
    assert_eq!(slow.try_recv(), Some(pixel(3)));
}

#[tokio::test]
async fn track_updates_member_metadata() {
    let hub = LocalHub::new();
    let a = hub.subscribe(1, "a", json!({"name": "old"})).await.expect("a");
    a.track(json!({"name": "new"}));
    assert_eq!(hub.members(1), vec![("a".to_owned(), json!({"name": "new"}))]);
    assert_eq!(a.key(), "a");
}

#[tokio::test]
async fn every_other_member_receives_active_events() {
    let hub = LocalHub::new();
    let a = hub.subscribe(1, "a", json!({})).await.expect("a");
    let mut b = hub.subscribe(1, "b", json!({})).await.expect("b");
    let mut c = hub.subscribe(1, "c", json!({})).await.expect("c");

    let active = ChannelEvent::Active(ActiveEvent { key: "a".into(), meta: json!({}) });
    a.send(&active);
    assert_eq!(b.recv().await, Some(active.clone()));
    assert_eq!(c.recv().await, Some(active));
}
