use serde_json::json;

use super::*;

#[test]
fn players_are_sorted_by_key() {
    let mut presence = Presence::default();
    let now = Instant::now();
    presence.observe_at("zed", json!({}), now);
    presence.observe_at("amy", json!({"name": "Amy"}), now);
    presence.observe_at("kim", json!({}), now);

    let keys: Vec<_> = presence.players().iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["amy", "kim", "zed"]);
}

#[test]
fn observe_refreshes_meta_and_timestamp() {
    let mut presence = Presence::default();
    let start = Instant::now();
    presence.observe_at("amy", json!({"v": 1}), start);
    presence.observe_at("amy", json!({"v": 2}), start + Duration::from_secs(10));

    assert_eq!(presence.len(), 1);
    let record = presence.players()[0];
    assert_eq!(record.meta, json!({"v": 2}));
    assert_eq!(record.last_seen, start + Duration::from_secs(10));
}

#[test]
fn prune_drops_idle_identities_without_new_events() {
    let mut presence = Presence::default();
    let start = Instant::now();
    presence.observe_at("amy", json!({}), start);
    presence.observe_at("bob", json!({}), start + Duration::from_secs(120));

    assert_eq!(presence.prune_at(start + Duration::from_secs(180)), 0);
    assert_eq!(presence.prune_at(start + Duration::from_secs(181)), 1);
    assert!(!presence.contains("amy"));
    assert!(presence.contains("bob"));

    presence.prune_at(start + Duration::from_secs(400));
    assert!(presence.is_empty());
}

#[test]
fn observe_prunes_others() {
    let mut presence = Presence::new(Duration::from_secs(5));
    let start = Instant::now();
    presence.observe_at("old", json!({}), start);
    presence.observe_at("new", json!({}), start + Duration::from_secs(6));
    assert_eq!(presence.players().len(), 1);
    assert!(presence.contains("new"));
}
