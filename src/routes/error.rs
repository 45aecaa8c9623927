//! HTTP error type shared by the REST routes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use canvas::grid::BoardId;
use canvas::store::StoreError;

use crate::frame::{ErrorCode, error_body};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("board {board_id} has size {stored}, request has {requested}")]
    SizeMismatch { board_id: BoardId, stored: u32, requested: u32 },
    #[error("cell {idx} is outside board {board_id}")]
    CellOutOfRange { board_id: BoardId, idx: u32 },
    #[error("pixel record not found: board {board_id} cell {idx}")]
    PixelNotFound { board_id: BoardId, idx: u32 },
    #[error("tile is {actual} bytes, limit is {max}")]
    TileTooLarge { actual: usize, max: usize },
    #[error("tile is not a PNG")]
    NotPng,
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_BOARD_NOT_FOUND",
            Self::Conflict { .. } => "E_VERSION_CONFLICT",
            Self::InvalidSnapshot(_) => "E_INVALID_SNAPSHOT",
            Self::Unavailable(_) => "E_STORE_UNAVAILABLE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Conflict { .. })
    }
}

impl ErrorCode for ApiError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Store(e) => e.error_code(),
            Self::SizeMismatch { .. } => "E_INVALID_SNAPSHOT",
            Self::CellOutOfRange { .. } => "E_CELL_OUT_OF_RANGE",
            Self::PixelNotFound { .. } => "E_PIXEL_NOT_FOUND",
            Self::TileTooLarge { .. } => "E_TILE_TOO_LARGE",
            Self::NotPng => "E_TILE_NOT_PNG",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.retryable(),
            _ => false,
        }
    }
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Store(StoreError::NotFound(_)) | Self::PixelNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Store(StoreError::Conflict { .. }) => StatusCode::CONFLICT,
            Self::Store(StoreError::InvalidSnapshot(_))
            | Self::SizeMismatch { .. }
            | Self::CellOutOfRange { .. }
            | Self::NotPng => StatusCode::BAD_REQUEST,
            Self::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::TileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(code = self.error_code(), error = %self, "api request failed");
        }
        let mut body = error_body(&self);
        if let Self::Store(StoreError::Conflict { actual, .. }) = &self {
            body["actual_version"] = (*actual).into();
        }
        (status, Json(body)).into_response()
    }
}
