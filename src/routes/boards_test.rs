use super::*;
use crate::frame::ErrorCode;
use crate::state::test_helpers::test_app_state;
use axum::http::StatusCode;
use canvas::codec;

fn put_body(size: u32, cells: &[u16], expected_version: Option<i64>) -> PutBoardBody {
    PutBoardBody {
        size,
        data: Some(codec::encode_cells(cells)),
        owners_json: Some(r#"{"165":"A"}"#.into()),
        images_json: None,
        expected_version,
    }
}

fn cells_with(idx: usize, color: u16) -> Vec<u16> {
    let mut cells = vec![0; 1024];
    cells[idx] = color;
    cells
}

#[test]
fn api_error_maps_status_and_code() {
    let cases = [
        (ApiError::Store(StoreError::NotFound(1)), StatusCode::NOT_FOUND, "E_BOARD_NOT_FOUND"),
        (
            ApiError::Store(StoreError::Conflict { expected: 1, actual: 2 }),
            StatusCode::CONFLICT,
            "E_VERSION_CONFLICT",
        ),
        (
            ApiError::Store(StoreError::InvalidSnapshot("bad".into())),
            StatusCode::BAD_REQUEST,
            "E_INVALID_SNAPSHOT",
        ),
        (ApiError::TileTooLarge { actual: 9, max: 1 }, StatusCode::PAYLOAD_TOO_LARGE, "E_TILE_TOO_LARGE"),
    ];
    for (err, status, code) in cases {
        assert_eq!(err.status(), status);
        assert_eq!(err.error_code(), code);
    }
}

#[tokio::test]
async fn missing_board_is_404() {
    let (state, _) = test_app_state().await;
    let err = get_board(State(state), Path(77)).await.expect_err("missing");
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_then_get_round_trips_the_snapshot() {
    let (state, _) = test_app_state().await;
    let Json(reply) = put_board(State(state.clone()), Path(1), Json(put_body(32, &cells_with(165, 3), None)))
        .await
        .expect("put");
    assert_eq!(reply["version"], json!(1));

    let Json(row) = get_board(State(state), Path(1)).await.expect("get");
    let cells = codec::decode_cells(row.data.as_deref().unwrap_or(""), Grid::new(32)).expect("decodes");
    assert_eq!(cells[165], 3);
    assert_eq!(row.owners_json.as_deref(), Some(r#"{"165":"A"}"#));
}

#[tokio::test]
async fn wrong_length_blob_is_400() {
    let (state, _) = test_app_state().await;
    let err = put_board(State(state), Path(1), Json(put_body(32, &[1; 1000], None)))
        .await
        .expect_err("short blob");
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert_eq!(err.error_code(), "E_INVALID_SNAPSHOT");
}

#[tokio::test]
async fn size_must_match_existing_board() {
    let (state, _) = test_app_state().await;
    let err = put_board(State(state), Path(1), Json(put_body(2, &[1, 1, 1, 1], None)))
        .await
        .expect_err("size mismatch");
    assert!(matches!(err, ApiError::SizeMismatch { stored: 32, requested: 2, .. }));
}

#[tokio::test]
async fn stale_conditional_write_is_409() {
    let (state, _) = test_app_state().await;
    put_board(State(state.clone()), Path(1), Json(put_body(32, &cells_with(0, 1), Some(0))))
        .await
        .expect("first");
    let err = put_board(State(state.clone()), Path(1), Json(put_body(32, &cells_with(0, 2), Some(0))))
        .await
        .expect_err("stale");
    assert_eq!(err.status(), StatusCode::CONFLICT);

    // Unconditional writes still win.
    let Json(reply) = put_board(State(state), Path(1), Json(put_body(32, &cells_with(0, 2), None)))
        .await
        .expect("lww");
    assert_eq!(reply["version"], json!(2));
}

#[tokio::test]
async fn pixel_records_are_written_and_listed() {
    let (state, _) = test_app_state().await;
    put_pixel(
        State(state.clone()),
        Path((1, 165)),
        Json(PutPixelBody { owner: Some("A".into()), color_idx: 3 }),
    )
    .await
    .expect("put pixel");

    let Json(one) = get_pixel(State(state.clone()), Path((1, 165))).await.expect("get");
    assert_eq!(one.owner.as_deref(), Some("A"));
    let Json(all) = list_pixels(State(state.clone()), Path(1)).await.expect("list");
    assert_eq!(all.len(), 1);

    let err = get_pixel(State(state), Path((1, 0))).await.expect_err("absent");
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pixel_outside_board_is_rejected() {
    let (state, _) = test_app_state().await;
    let err = put_pixel(State(state), Path((1, 1024)), Json(PutPixelBody { owner: None, color_idx: 1 }))
        .await
        .expect_err("off board");
    assert!(matches!(err, ApiError::CellOutOfRange { idx: 1024, .. }));
}

#[tokio::test]
async fn image_record_is_stored() {
    let (state, store) = test_app_state().await;
    put_image(
        State(state),
        Path((2, 5)),
        Json(PutImageBody { path: "2/5-1.png".into(), owner: Some("B".into()) }),
    )
    .await
    .expect("put image");
    let image = store.pixel_image(2, 5).await.expect("stored");
    assert_eq!(image.path, "2/5-1.png");
}
