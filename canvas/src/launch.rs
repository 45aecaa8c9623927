//! Token-launch notification.
//!
//! Every successful placement produces a [`LaunchRequest`] that is handed to
//! a [`LaunchNotifier`] and forgotten. The notifier's outcome never affects
//! the placement.

#[cfg(test)]
#[path = "launch_test.rs"]
mod launch_test;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::grid::BoardId;

pub const LAUNCH_SYMBOL: &str = "SOLPLACE";
pub const DEFAULT_LAUNCH_NAME: &str = "r/place dot";
pub const MAX_LAUNCH_NAME: usize = 32;
pub const LAUNCH_IMAGE_TYPE: &str = "image/png";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequest {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub image_base64: String,
    pub image_type: String,
    pub x: i64,
    pub y: i64,
    pub board_id: BoardId,
}

impl LaunchRequest {
    /// Build the request for a placement at `(x, y)`. `png_base64` is the
    /// swatch or tile image.
    #[must_use]
    pub fn for_placement(board_id: BoardId, x: i64, y: i64, owner: Option<&str>, png_base64: String) -> Self {
        Self {
            name: launch_name(owner),
            symbol: LAUNCH_SYMBOL.to_owned(),
            description: format!("Pixel at ({x},{y}) on board {board_id}"),
            image_base64: png_base64,
            image_type: LAUNCH_IMAGE_TYPE.to_owned(),
            x,
            y,
            board_id,
        }
    }
}

/// Owner name trimmed to at most 32 characters, or the default name.
#[must_use]
pub fn launch_name(owner: Option<&str>) -> String {
    let trimmed = owner.map_or("", str::trim);
    if trimmed.is_empty() {
        DEFAULT_LAUNCH_NAME.to_owned()
    } else {
        trimmed.chars().take(MAX_LAUNCH_NAME).collect()
    }
}

/// Receiver of launch requests. Implementations log their own failures.
#[async_trait]
pub trait LaunchNotifier: Send + Sync {
    async fn notify(&self, request: LaunchRequest);
}
