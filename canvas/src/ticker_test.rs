use serde_json::json;

use super::*;
use crate::event::{ActiveEvent, ImageEvent, PixelEvent};

fn pixel_by(owner: Option<&str>) -> ChannelEvent {
    ChannelEvent::Pixel(PixelEvent { x: 0, y: 0, color_index: 1, owner: owner.map(str::to_owned), sender: None })
}

#[test]
fn line_lowercases_owner() {
    assert_eq!(ticker_line(Some("Amy")), "amy placed a pixel!");
    assert_eq!(ticker_line(None), "anonymous placed a pixel!");
    assert_eq!(ticker_line(Some("  ")), "anonymous placed a pixel!");
}

#[test]
fn newest_line_comes_first() {
    let mut ticker = Ticker::default();
    ticker.observe(&pixel_by(Some("A")));
    ticker.observe(&ChannelEvent::Image(ImageEvent { x: 0, y: 0, url: "u".into(), owner: Some("B".into()), sender: None }));
    assert_eq!(ticker.lines().collect::<Vec<_>>(), vec!["b placed a pixel!", "a placed a pixel!"]);
}

#[test]
fn keeps_only_the_last_25() {
    let mut ticker = Ticker::default();
    for i in 0..30 {
        ticker.observe(&pixel_by(Some(&format!("p{i}"))));
    }
    assert_eq!(ticker.len(), 25);
    assert_eq!(ticker.lines().next(), Some("p29 placed a pixel!"));
    assert_eq!(ticker.lines().last(), Some("p5 placed a pixel!"));
}

#[test]
fn active_events_are_not_listed() {
    let mut ticker = Ticker::default();
    let active = ChannelEvent::Active(ActiveEvent { key: "k".into(), meta: json!({}) });
    assert_eq!(ticker.observe(&active), None);
    assert!(ticker.is_empty());
}
