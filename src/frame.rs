//! Server-side frame helpers.
//!
//! The wire type lives in the `frames` crate; this module adds what only the
//! relay needs: reply construction (`done` / `error`) correlated through
//! `parent_id`, and the [`ErrorCode`] trait that turns typed errors into
//! structured error frames and HTTP bodies.

use std::time::{SystemTime, UNIX_EPOCH};

use frames::{Frame, Status};
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Frame data key for error messages.
pub const FRAME_MESSAGE: &str = "message";

/// Frame data key for grepable error codes.
pub const FRAME_CODE: &str = "code";

/// Frame data key for the retryable flag on error frames.
pub const FRAME_RETRYABLE: &str = "retryable";

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured errors.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// `{code, message, retryable}` body shared by error frames and HTTP errors.
pub fn error_body(err: &(impl ErrorCode + ?Sized)) -> Value {
    json!({
        FRAME_CODE: err.error_code(),
        FRAME_MESSAGE: err.to_string(),
        FRAME_RETRYABLE: err.retryable(),
    })
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

/// Current time as milliseconds since Unix epoch.
fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

/// Create a server-originated request frame.
pub fn request(event: impl Into<String>, data: Value) -> Frame {
    Frame {
        id: Uuid::new_v4().to_string(),
        parent_id: None,
        ts: now_ms(),
        board_id: None,
        from: None,
        event: event.into(),
        status: Status::Request,
        data,
    }
}

/// Replies to an inbound frame. Each reply inherits `board_id` and `event`
/// and points back at the request through `parent_id`.
pub trait Reply {
    fn done(&self) -> Frame;
    fn done_with(&self, data: Value) -> Frame;
    fn error(&self, message: impl Into<String>) -> Frame;
    fn error_from(&self, err: &(impl ErrorCode + ?Sized)) -> Frame;
}

impl Reply for Frame {
    fn done(&self) -> Frame {
        reply(self, Status::Done, Value::Object(Map::new()))
    }

    fn done_with(&self, data: Value) -> Frame {
        reply(self, Status::Done, data)
    }

    fn error(&self, message: impl Into<String>) -> Frame {
        reply(self, Status::Error, json!({ FRAME_MESSAGE: message.into() }))
    }

    fn error_from(&self, err: &(impl ErrorCode + ?Sized)) -> Frame {
        reply(self, Status::Error, error_body(err))
    }
}

fn reply(req: &Frame, status: Status, data: Value) -> Frame {
    Frame {
        id: Uuid::new_v4().to_string(),
        parent_id: Some(req.id.clone()),
        ts: now_ms(),
        board_id: req.board_id,
        from: None,
        event: req.event.clone(),
        status,
        data,
    }
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
