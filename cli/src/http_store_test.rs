use super::*;

#[test]
fn not_found_maps_to_board() {
    let err = status_error(StatusCode::NOT_FOUND, 7, None, &Value::Null);
    assert!(matches!(err, StoreError::NotFound(7)));
}

#[test]
fn conflict_carries_both_versions() {
    let body = json!({"code": "E_VERSION_CONFLICT", "message": "stale", "actual_version": 9});
    let err = status_error(StatusCode::CONFLICT, 1, Some(4), &body);
    assert!(matches!(err, StoreError::Conflict { expected: 4, actual: 9 }));
}

#[test]
fn bad_request_keeps_server_message() {
    let body = json!({"code": "E_INVALID_SNAPSHOT", "message": "blob has 3 bytes"});
    match status_error(StatusCode::BAD_REQUEST, 1, None, &body) {
        StoreError::InvalidSnapshot(message) => assert_eq!(message, "blob has 3 bytes"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn other_statuses_are_unavailable() {
    for status in [StatusCode::SERVICE_UNAVAILABLE, StatusCode::PAYLOAD_TOO_LARGE, StatusCode::BAD_GATEWAY] {
        let err = status_error(status, 1, None, &json!("down"));
        assert!(matches!(err, StoreError::Unavailable(_)), "{status}");
    }
}

#[test]
fn base_url_trailing_slash_is_trimmed() {
    let store = HttpBoardStore::new(reqwest::Client::new(), "http://127.0.0.1:3000/");
    assert_eq!(store.url("/api/boards/1"), "http://127.0.0.1:3000/api/boards/1");
}

#[tokio::test]
async fn unreachable_server_is_unavailable() {
    let addr = std::net::TcpListener::bind("127.0.0.1:0").and_then(|l| l.local_addr()).expect("probe port");
    let store = HttpBoardStore::new(reqwest::Client::new(), &format!("http://{addr}"));
    let err = store.load_board(1).await.expect_err("no server");
    assert!(matches!(err, StoreError::Unavailable(_)));
}
