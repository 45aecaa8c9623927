//! Broadcast events exchanged on a board channel.
//!
//! Payload field names (`colorIndex`, `url`, `owner`, `key`, `meta`) are the
//! wire names every client agrees on. Numbers are read through `f64` because
//! the protobuf envelope carries all JSON numbers as doubles.

#[cfg(test)]
#[path = "event_test.rs"]
mod event_test;

use std::time::{SystemTime, UNIX_EPOCH};

use frames::{EVENT_ACTIVE, EVENT_IMAGE, EVENT_PIXEL, Frame, Status};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::consts::ANONYMOUS_KEY;
use crate::grid::BoardId;

/// A color placed on one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelEvent {
    pub x: i64,
    pub y: i64,
    pub color_index: u16,
    pub owner: Option<String>,
    /// Presence key of the member that broadcast it, when known.
    pub sender: Option<String>,
}

/// An image tile placed on one cell. `url` points at the uploaded tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEvent {
    pub x: i64,
    pub y: i64,
    pub url: String,
    pub owner: Option<String>,
    pub sender: Option<String>,
}

/// "This identity is active right now."
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveEvent {
    pub key: String,
    pub meta: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Pixel(PixelEvent),
    Image(ImageEvent),
    Active(ActiveEvent),
}

impl ChannelEvent {
    /// Wire event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pixel(_) => EVENT_PIXEL,
            Self::Image(_) => EVENT_IMAGE,
            Self::Active(_) => EVENT_ACTIVE,
        }
    }

    /// Attributed owner of a placement. `None` for `active`.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        match self {
            Self::Pixel(p) => p.owner.as_deref(),
            Self::Image(i) => i.owner.as_deref(),
            Self::Active(_) => None,
        }
    }

    /// Presence key of the member behind the event. For `active` that is
    /// the announced key itself.
    #[must_use]
    pub fn sender(&self) -> Option<&str> {
        match self {
            Self::Pixel(p) => p.sender.as_deref(),
            Self::Image(i) => i.sender.as_deref(),
            Self::Active(a) => Some(&a.key),
        }
    }

    /// True for events that change the grid.
    #[must_use]
    pub fn is_placement(&self) -> bool {
        !matches!(self, Self::Active(_))
    }

    /// JSON payload as sent on the wire.
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::Pixel(p) => json!({
                "x": p.x,
                "y": p.y,
                "colorIndex": p.color_index,
                "owner": p.owner,
            }),
            Self::Image(i) => json!({
                "x": i.x,
                "y": i.y,
                "url": i.url,
                "owner": i.owner,
            }),
            Self::Active(a) => json!({
                "key": a.key,
                "meta": a.meta,
            }),
        }
    }

    /// Wrap the event in a broadcast frame for `board_id`.
    #[must_use]
    pub fn to_frame(&self, board_id: BoardId, from: Option<&str>) -> Frame {
        let mut frame = request_frame(self.name(), self.payload());
        frame.board_id = Some(board_id);
        frame.from = from.map(str::to_owned);
        frame
    }

    /// Parse a broadcast frame. Returns `None` for other events and for
    /// payloads missing required fields; those are dropped by receivers.
    /// Placements take their sender from the frame's `from`.
    #[must_use]
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        match frame.event.as_str() {
            EVENT_PIXEL => {
                let Ok(color_index) = u16::try_from(whole(frame.number("colorIndex")?)?) else {
                    return None;
                };
                Some(Self::Pixel(PixelEvent {
                    x: whole(frame.number("x")?)?,
                    y: whole(frame.number("y")?)?,
                    color_index,
                    owner: owner_field(frame),
                    sender: sender_field(frame),
                }))
            }
            EVENT_IMAGE => {
                let url = frame.text("url").filter(|u| !u.is_empty())?;
                Some(Self::Image(ImageEvent {
                    x: whole(frame.number("x")?)?,
                    y: whole(frame.number("y")?)?,
                    url: url.to_owned(),
                    owner: owner_field(frame),
                    sender: sender_field(frame),
                }))
            }
            EVENT_ACTIVE => {
                let key = frame
                    .text("key")
                    .filter(|k| !k.is_empty())
                    .unwrap_or(ANONYMOUS_KEY);
                let meta = frame
                    .data
                    .get("meta")
                    .filter(|m| !m.is_null())
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Map::new()));
                Some(Self::Active(ActiveEvent { key: key.to_owned(), meta }))
            }
            _ => None,
        }
    }
}

/// Build a fresh request frame with a new id and the current timestamp.
#[must_use]
pub fn request_frame(event: &str, data: Value) -> Frame {
    Frame {
        id: Uuid::new_v4().to_string(),
        parent_id: None,
        ts: now_millis(),
        board_id: None,
        from: None,
        event: event.to_owned(),
        status: Status::Request,
        data,
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

fn owner_field(frame: &Frame) -> Option<String> {
    frame
        .text("owner")
        .filter(|o| !o.is_empty())
        .map(str::to_owned)
}

/// The relay stamps `from` with the broadcaster's presence key.
fn sender_field(frame: &Frame) -> Option<String> {
    frame.from.clone().filter(|f| !f.is_empty())
}

/// Accept only finite whole numbers. Range checks happen against the grid.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::float_cmp)]
fn whole(value: f64) -> Option<i64> {
    if !value.is_finite() || value.trunc() != value {
        return None;
    }
    if value < i64::MIN as f64 || value > i64::MAX as f64 {
        return None;
    }
    Some(value as i64)
}
