use super::*;

#[derive(Debug, thiserror::Error)]
enum TestError {
    #[error("board 9 not found")]
    Missing,
    #[error("try again")]
    Busy,
}

impl ErrorCode for TestError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Missing => "E_TEST_MISSING",
            Self::Busy => "E_TEST_BUSY",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

#[test]
fn request_sets_fields() {
    let frame = request("channel:connected", json!({"client_id": "c"}));
    assert_eq!(frame.event, "channel:connected");
    assert_eq!(frame.status, Status::Request);
    assert!(frame.parent_id.is_none());
    assert!(frame.board_id.is_none());
    assert!(frame.ts > 0);
}

#[test]
fn reply_inherits_context() {
    let mut req = request("channel:join", json!({}));
    req.board_id = Some(1);
    let done = req.done_with(json!({"members": 2}));

    assert_eq!(done.parent_id.as_deref(), Some(req.id.as_str()));
    assert_eq!(done.board_id, Some(1));
    assert_eq!(done.event, "channel:join");
    assert_eq!(done.status, Status::Done);
    assert_ne!(done.id, req.id);
}

#[test]
fn done_carries_empty_object() {
    let req = request("channel:leave", json!({}));
    assert_eq!(req.done().data, json!({}));
}

#[test]
fn error_from_carries_code_and_retryable() {
    let req = request("pixel", json!({}));
    let err = req.error_from(&TestError::Missing);
    assert_eq!(err.status, Status::Error);
    assert_eq!(err.text(FRAME_CODE), Some("E_TEST_MISSING"));
    assert_eq!(err.text(FRAME_MESSAGE), Some("board 9 not found"));
    assert_eq!(err.data[FRAME_RETRYABLE], json!(false));

    let busy = req.error_from(&TestError::Busy);
    assert_eq!(busy.data[FRAME_RETRYABLE], json!(true));
}

#[test]
fn plain_error_has_message_only() {
    let req = request("pixel", json!({}));
    let err = req.error("nope");
    assert_eq!(err.text(FRAME_MESSAGE), Some("nope"));
    assert!(err.data.get(FRAME_CODE).is_none());
}
