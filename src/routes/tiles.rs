//! Tile upload route.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::Json;
use canvas::grid::BoardId;
use serde_json::{Value, json};

use crate::routes::boards::check_cell;
use crate::routes::error::ApiError;
use crate::services::tiles::is_png;
use crate::state::AppState;

/// `POST /api/tiles/{board_id}/{idx}` — raw PNG body, returns `{url}`.
pub async fn upload_tile(
    State(state): State<AppState>,
    Path((board_id, idx)): Path<(BoardId, u32)>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let max = state.config.max_tile_bytes;
    if body.len() > max {
        return Err(ApiError::TileTooLarge { actual: body.len(), max });
    }
    if !is_png(&body) {
        return Err(ApiError::NotPng);
    }
    check_cell(&state, board_id, idx).await?;
    let url = state.tiles.put_tile(board_id, idx, body.to_vec()).await?;
    Ok(Json(json!({ "url": url })))
}

#[cfg(test)]
#[path = "tiles_test.rs"]
mod tests;
