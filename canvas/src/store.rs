//! Board store contract.
//!
//! The store keeps one snapshot row per board plus two auxiliary per-cell
//! tables (owners and image placements). Snapshot writes are whole-row
//! overwrites: the last writer wins unless the caller passes an expected
//! version, in which case a stale write is refused with
//! [`StoreError::Conflict`].
//!
//! [`MemoryStore`] is a complete in-process implementation. The server uses
//! it when no database is configured and tests use it everywhere.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::codec;
use crate::grid::{BoardId, Grid};

/// Stored snapshot row. Optional columns may be absent on older schemas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardRow {
    pub id: BoardId,
    pub size: u32,
    pub data: Option<String>,
    #[serde(default)]
    pub owners_json: Option<String>,
    #[serde(default)]
    pub images_json: Option<String>,
    /// Bumped by every successful write. Zero for a never-written board.
    #[serde(default)]
    pub version: i64,
}

impl BoardRow {
    /// A row with no snapshot yet.
    #[must_use]
    pub fn empty(id: BoardId, size: u32) -> Self {
        Self { id, size, data: None, owners_json: None, images_json: None, version: 0 }
    }
}

/// Per-cell attribution record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelOwner {
    pub board_id: BoardId,
    pub idx: u32,
    pub owner: Option<String>,
    pub color_idx: u16,
}

/// Per-cell image placement record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelImage {
    pub board_id: BoardId,
    pub idx: u32,
    pub path: String,
    pub owner: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("board {0} not found")]
    NotFound(BoardId),
    #[error("version conflict: expected {expected}, stored {actual}")]
    Conflict { expected: i64, actual: i64 },
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable snapshot storage shared by every client of a board.
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Fetch the snapshot row. Absent optional columns come back as `None`.
    async fn load_board(&self, board_id: BoardId) -> Result<BoardRow, StoreError>;

    /// Overwrite the snapshot row and return the new version.
    ///
    /// With `expected_version == None` the write always wins. With
    /// `Some(v)` it is refused when the stored version is not `v`.
    async fn upsert_board(&self, row: &BoardRow, expected_version: Option<i64>) -> Result<i64, StoreError>;

    async fn upsert_pixel_owner(&self, owner: &PixelOwner) -> Result<(), StoreError>;

    async fn upsert_pixel_image(&self, image: &PixelImage) -> Result<(), StoreError>;

    async fn list_pixel_owners(&self, board_id: BoardId) -> Result<Vec<PixelOwner>, StoreError>;

    async fn pixel_owner(&self, board_id: BoardId, idx: u32) -> Result<Option<PixelOwner>, StoreError>;
}

/// Storage for uploaded image tiles.
#[async_trait]
pub trait TileStore: Send + Sync {
    /// Store PNG bytes for a cell and return the tile's public URL.
    async fn put_tile(&self, board_id: BoardId, idx: u32, png: Vec<u8>) -> Result<String, StoreError>;
}

/// Object path of a tile, relative to the tile root.
#[must_use]
pub fn tile_path(board_id: BoardId, idx: u32, ts: i64) -> String {
    format!("{board_id}/{idx}-{ts}.png")
}

/// Check that a row is writable: the blob, when present, must decode to
/// exactly `size * size` cells, and the sparse maps must be JSON objects.
///
/// # Errors
///
/// Returns [`StoreError::InvalidSnapshot`] describing the first problem.
pub fn validate_row(row: &BoardRow) -> Result<(), StoreError> {
    let grid = Grid::new(row.size);
    if row.size == 0 {
        return Err(StoreError::InvalidSnapshot("size must be positive".into()));
    }
    if let Some(data) = &row.data {
        if codec::decode_cells(data, grid).is_none() {
            return Err(StoreError::InvalidSnapshot(format!(
                "data does not decode to {} cells",
                grid.cell_count()
            )));
        }
    }
    for (column, value) in [("owners_json", &row.owners_json), ("images_json", &row.images_json)] {
        if let Some(json) = value {
            if codec::decode_sparse(json, grid).is_none() {
                return Err(StoreError::InvalidSnapshot(format!("{column} is not a JSON object")));
            }
        }
    }
    Ok(())
}

#[derive(Default)]
struct MemoryInner {
    boards: HashMap<BoardId, BoardRow>,
    owners: BTreeMap<(BoardId, u32), PixelOwner>,
    images: BTreeMap<(BoardId, u32), PixelImage>,
    tiles: HashMap<String, Vec<u8>>,
    tile_seq: i64,
}

/// In-process store. Cloning shares the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
    tile_base_url: Arc<str>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose tile URLs are rooted at `base_url`.
    #[must_use]
    pub fn with_tile_base_url(base_url: &str) -> Self {
        Self { inner: Arc::default(), tile_base_url: Arc::from(base_url.trim_end_matches('/')) }
    }

    /// Create an empty board, as an operator would out-of-band.
    pub async fn create_board(&self, board_id: BoardId, size: u32) {
        let mut inner = self.inner.write().await;
        inner
            .boards
            .entry(board_id)
            .or_insert_with(|| BoardRow::empty(board_id, size));
    }

    /// Bytes of a stored tile, by path relative to the tile root.
    pub async fn tile(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.read().await.tiles.get(path).cloned()
    }

    pub async fn pixel_image(&self, board_id: BoardId, idx: u32) -> Option<PixelImage> {
        self.inner.read().await.images.get(&(board_id, idx)).cloned()
    }
}

#[async_trait]
impl BoardStore for MemoryStore {
    async fn load_board(&self, board_id: BoardId) -> Result<BoardRow, StoreError> {
        self.inner
            .read()
            .await
            .boards
            .get(&board_id)
            .cloned()
            .ok_or(StoreError::NotFound(board_id))
    }

    async fn upsert_board(&self, row: &BoardRow, expected_version: Option<i64>) -> Result<i64, StoreError> {
        validate_row(row)?;
        let mut inner = self.inner.write().await;
        let current = inner.boards.get(&row.id).map_or(0, |r| r.version);
        if let Some(expected) = expected_version {
            if expected != current {
                return Err(StoreError::Conflict { expected, actual: current });
            }
        }
        let version = current + 1;
        inner.boards.insert(row.id, BoardRow { version, ..row.clone() });
        Ok(version)
    }

    async fn upsert_pixel_owner(&self, owner: &PixelOwner) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.owners.insert((owner.board_id, owner.idx), owner.clone());
        Ok(())
    }

    async fn upsert_pixel_image(&self, image: &PixelImage) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.images.insert((image.board_id, image.idx), image.clone());
        Ok(())
    }

    async fn list_pixel_owners(&self, board_id: BoardId) -> Result<Vec<PixelOwner>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .owners
            .range((board_id, 0)..=(board_id, u32::MAX))
            .map(|(_, owner)| owner.clone())
            .collect())
    }

    async fn pixel_owner(&self, board_id: BoardId, idx: u32) -> Result<Option<PixelOwner>, StoreError> {
        Ok(self.inner.read().await.owners.get(&(board_id, idx)).cloned())
    }
}

#[async_trait]
impl TileStore for MemoryStore {
    async fn put_tile(&self, board_id: BoardId, idx: u32, png: Vec<u8>) -> Result<String, StoreError> {
        let mut inner = self.inner.write().await;
        inner.tile_seq += 1;
        let path = tile_path(board_id, idx, inner.tile_seq);
        inner.tiles.insert(path.clone(), png);
        Ok(format!("{}/tiles/{path}", self.tile_base_url))
    }
}
