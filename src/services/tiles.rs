//! Filesystem tile store.
//!
//! Tiles land under `{root}/{board_id}/{idx}-{ts}.png` and are served back by
//! the static `/tiles` route, so the URL handed to clients is the public base
//! URL plus the same relative path. A new upload for a cell never replaces
//! the old file; the timestamp keeps paths unique.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use canvas::grid::BoardId;
use canvas::store::{StoreError, TileStore, tile_path};
use tracing::info;

/// First eight bytes of every PNG file.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

#[must_use]
pub fn is_png(bytes: &[u8]) -> bool {
    bytes.starts_with(&PNG_SIGNATURE)
}

pub struct FsTileStore {
    root: PathBuf,
    base_url: String,
}

impl FsTileStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self { root: root.into(), base_url: base_url.trim_end_matches('/').to_owned() }
    }
}

fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

#[async_trait]
impl TileStore for FsTileStore {
    async fn put_tile(&self, board_id: BoardId, idx: u32, png: Vec<u8>) -> Result<String, StoreError> {
        let relative = tile_path(board_id, idx, now_ms());
        let target = self.root.join(&relative);
        if let Some(dir) = target.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StoreError::Unavailable(format!("tile dir: {e}")))?;
        }
        let bytes = png.len();
        tokio::fs::write(&target, png)
            .await
            .map_err(|e| StoreError::Unavailable(format!("tile write: {e}")))?;
        info!(%board_id, idx, bytes, path = %relative, "stored tile");
        Ok(format!("{}/tiles/{relative}", self.base_url))
    }
}

#[cfg(test)]
#[path = "tiles_test.rs"]
mod tests;
