//! Channel envelope and protobuf codec for the realtime board transport.
//!
//! Both the relay server and every client speak this envelope. Payloads stay
//! loose (`serde_json::Value`) so the relay can forward placement events
//! without understanding them, while the bytes on the socket are protobuf.
//!
//! EVENTS
//! ======
//! - `channel:connected` (server → client) carries the assigned `client_id`.
//! - `channel:join` / `channel:track` / `channel:leave` manage the
//!   subscription of one socket to one board scope.
//! - `pixel`, `image`, `active` are broadcast events, relayed to every other
//!   subscriber of the board. The sender never gets its own copy back.

use prost::Message;
use prost_types::value::Kind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const EVENT_CONNECTED: &str = "channel:connected";
pub const EVENT_JOIN: &str = "channel:join";
pub const EVENT_TRACK: &str = "channel:track";
pub const EVENT_LEAVE: &str = "channel:leave";
pub const EVENT_PIXEL: &str = "pixel";
pub const EVENT_IMAGE: &str = "image";
pub const EVENT_ACTIVE: &str = "active";

/// Events the relay fans out to board peers.
pub const BROADCAST_EVENTS: [&str; 3] = [EVENT_PIXEL, EVENT_IMAGE, EVENT_ACTIVE];

/// True for events that are relayed rather than handled by the server.
#[must_use]
pub fn is_broadcast_event(event: &str) -> bool {
    BROADCAST_EVENTS.contains(&event)
}

/// Error returned by [`decode_frame`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to decode protobuf frame: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("invalid frame status: {0}")]
    InvalidStatus(i32),
}

/// Position of a frame in an exchange. Broadcasts are always `Request`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Request,
    Done,
    Error,
}

impl Status {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Request => WireStatus::Request as i32,
            Self::Done => WireStatus::Done as i32,
            Self::Error => WireStatus::Error as i32,
        }
    }

    fn from_i32(value: i32) -> Result<Self, CodecError> {
        match WireStatus::try_from(value) {
            Ok(WireStatus::Request) => Ok(Self::Request),
            Ok(WireStatus::Done) => Ok(Self::Done),
            Ok(WireStatus::Error) => Ok(Self::Error),
            Err(_) => Err(CodecError::InvalidStatus(value)),
        }
    }
}

/// One message on the board channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Unique frame id (UUID string).
    pub id: String,
    /// Id of the frame this one answers, for `done`/`error` replies.
    pub parent_id: Option<String>,
    /// Milliseconds since the Unix epoch at creation.
    pub ts: i64,
    /// Board scope, once a socket has joined one.
    pub board_id: Option<i64>,
    /// Presence key of the originating client. Unverified.
    pub from: Option<String>,
    /// Event name, e.g. `"pixel"` or `"channel:join"`.
    pub event: String,
    pub status: Status,
    pub data: Value,
}

impl Frame {
    /// Part of `event` before the first `:`.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.event
            .split_once(':')
            .map_or(self.event.as_str(), |(prefix, _)| prefix)
    }

    /// Read a numeric payload field. Integers arrive as floats after a
    /// protobuf round trip, so every numeric read goes through `f64`.
    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        self.data.get(key).and_then(Value::as_f64)
    }

    /// Read a string payload field.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

/// Encode a frame into protobuf bytes.
#[must_use]
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    WireFrame::from_frame(frame).encode_to_vec()
}

/// Decode protobuf bytes into a frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed bytes and
/// [`CodecError::InvalidStatus`] for unknown status values.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    WireFrame::decode(bytes)?.into_frame()
}

impl WireFrame {
    fn from_frame(frame: &Frame) -> Self {
        Self {
            id: frame.id.clone(),
            parent_id: frame.parent_id.clone(),
            ts: frame.ts,
            board_id: frame.board_id,
            from: frame.from.clone(),
            event: frame.event.clone(),
            status: frame.status.as_i32(),
            data: Some(to_proto(&frame.data)),
        }
    }

    fn into_frame(self) -> Result<Frame, CodecError> {
        let data = match &self.data {
            Some(value) => from_proto(value),
            None => Value::Object(Map::new()),
        };
        Ok(Frame {
            status: Status::from_i32(self.status)?,
            id: self.id,
            parent_id: self.parent_id,
            ts: self.ts,
            board_id: self.board_id,
            from: self.from,
            event: self.event,
            data,
        })
    }
}

// JSON <-> google.protobuf.Value. Every number travels as a double.

fn to_proto(value: &Value) -> prost_types::Value {
    let kind = match value {
        Value::Null => Kind::NullValue(prost_types::NullValue::NullValue.into()),
        Value::Bool(b) => Kind::BoolValue(*b),
        Value::Number(n) => Kind::NumberValue(n.as_f64().unwrap_or_default()),
        Value::String(s) => Kind::StringValue(s.clone()),
        Value::Array(items) => Kind::ListValue(prost_types::ListValue { values: items.iter().map(to_proto).collect() }),
        Value::Object(map) => {
            let fields = map.iter().map(|(k, v)| (k.clone(), to_proto(v))).collect();
            Kind::StructValue(prost_types::Struct { fields })
        }
    };
    prost_types::Value { kind: Some(kind) }
}

fn from_proto(value: &prost_types::Value) -> Value {
    match &value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(*b),
        Some(Kind::NumberValue(n)) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
        Some(Kind::StringValue(s)) => Value::String(s.clone()),
        Some(Kind::ListValue(list)) => Value::Array(list.values.iter().map(from_proto).collect()),
        Some(Kind::StructValue(st)) => {
            Value::Object(st.fields.iter().map(|(k, v)| (k.clone(), from_proto(v))).collect())
        }
    }
}

#[derive(Clone, PartialEq, Message)]
struct WireFrame {
    #[prost(string, tag = "1")]
    id: String,
    #[prost(string, optional, tag = "2")]
    parent_id: Option<String>,
    #[prost(int64, tag = "3")]
    ts: i64,
    #[prost(int64, optional, tag = "4")]
    board_id: Option<i64>,
    #[prost(string, optional, tag = "5")]
    from: Option<String>,
    #[prost(string, tag = "6")]
    event: String,
    #[prost(enumeration = "WireStatus", tag = "7")]
    status: i32,
    #[prost(message, optional, tag = "8")]
    data: Option<prost_types::Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
enum WireStatus {
    Request = 0,
    Done = 1,
    Error = 2,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
