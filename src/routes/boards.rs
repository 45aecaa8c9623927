//! Board snapshot and per-pixel record routes.
//!
//! Snapshot writes are whole-row overwrites. A body carrying
//! `expected_version` turns the write into a conditional one that fails with
//! 409 when someone else wrote first.

use axum::extract::{Path, State};
use axum::response::Json;
use canvas::grid::{BoardId, Grid};
use canvas::store::{BoardRow, PixelImage, PixelOwner, StoreError};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::routes::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PutBoardBody {
    pub size: u32,
    pub data: Option<String>,
    #[serde(default)]
    pub owners_json: Option<String>,
    #[serde(default)]
    pub images_json: Option<String>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PutPixelBody {
    pub owner: Option<String>,
    pub color_idx: u16,
}

#[derive(Debug, Deserialize)]
pub struct PutImageBody {
    pub path: String,
    pub owner: Option<String>,
}

/// `GET /api/boards/{id}` — snapshot row.
pub async fn get_board(State(state): State<AppState>, Path(board_id): Path<BoardId>) -> Result<Json<BoardRow>, ApiError> {
    Ok(Json(state.store.load_board(board_id).await?))
}

/// `PUT /api/boards/{id}` — overwrite the snapshot, returns `{version}`.
pub async fn put_board(
    State(state): State<AppState>,
    Path(board_id): Path<BoardId>,
    Json(body): Json<PutBoardBody>,
) -> Result<Json<Value>, ApiError> {
    match state.store.load_board(board_id).await {
        Ok(existing) if existing.size != body.size => {
            return Err(ApiError::SizeMismatch { board_id, stored: existing.size, requested: body.size });
        }
        Ok(_) | Err(StoreError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    let row = BoardRow {
        id: board_id,
        size: body.size,
        data: body.data,
        owners_json: body.owners_json,
        images_json: body.images_json,
        version: body.expected_version.unwrap_or(0),
    };
    let version = state.store.upsert_board(&row, body.expected_version).await?;
    info!(%board_id, version, conditional = body.expected_version.is_some(), "board snapshot written");
    Ok(Json(json!({ "version": version })))
}

/// `GET /api/boards/{id}/pixels` — every per-pixel owner record.
pub async fn list_pixels(
    State(state): State<AppState>,
    Path(board_id): Path<BoardId>,
) -> Result<Json<Vec<PixelOwner>>, ApiError> {
    Ok(Json(state.store.list_pixel_owners(board_id).await?))
}

/// `GET /api/boards/{id}/pixels/{idx}` — one owner record.
pub async fn get_pixel(
    State(state): State<AppState>,
    Path((board_id, idx)): Path<(BoardId, u32)>,
) -> Result<Json<PixelOwner>, ApiError> {
    state
        .store
        .pixel_owner(board_id, idx)
        .await?
        .map(Json)
        .ok_or(ApiError::PixelNotFound { board_id, idx })
}

/// `PUT /api/boards/{id}/pixels/{idx}` — record who placed a color.
pub async fn put_pixel(
    State(state): State<AppState>,
    Path((board_id, idx)): Path<(BoardId, u32)>,
    Json(body): Json<PutPixelBody>,
) -> Result<Json<Value>, ApiError> {
    check_cell(&state, board_id, idx).await?;
    let record = PixelOwner { board_id, idx, owner: body.owner, color_idx: body.color_idx };
    state.store.upsert_pixel_owner(&record).await?;
    Ok(Json(json!({ "ok": true })))
}

/// `PUT /api/boards/{id}/images/{idx}` — record an image placement.
pub async fn put_image(
    State(state): State<AppState>,
    Path((board_id, idx)): Path<(BoardId, u32)>,
    Json(body): Json<PutImageBody>,
) -> Result<Json<Value>, ApiError> {
    check_cell(&state, board_id, idx).await?;
    let record = PixelImage { board_id, idx, path: body.path, owner: body.owner };
    state.store.upsert_pixel_image(&record).await?;
    Ok(Json(json!({ "ok": true })))
}

/// Fails unless `idx` addresses a cell of an existing board.
pub(crate) async fn check_cell(state: &AppState, board_id: BoardId, idx: u32) -> Result<(), ApiError> {
    let row = state.store.load_board(board_id).await?;
    let in_range = usize::try_from(idx).is_ok_and(|i| Grid::new(row.size).contains(i));
    if in_range { Ok(()) } else { Err(ApiError::CellOutOfRange { board_id, idx }) }
}

#[cfg(test)]
#[path = "boards_test.rs"]
mod tests;
