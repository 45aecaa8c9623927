//! Canvas reconciler.
//!
//! Holds the in-memory board (cells, owners, images) for exactly one board id
//! and size, and merges three kinds of input into it:
//!
//! - local placements, applied optimistically before the network round trip;
//! - remote events from the channel, never throttled;
//! - a stored snapshot, accepted wholesale only before any local placement.
//!
//! There is no ordering between clients. Whatever is processed last wins,
//! and applying the same event twice has the same effect as applying it once.
//! A `pixel` write touches the color and owner of a cell, an `image` write
//! touches the image and owner; image precedence is decided at read time by
//! [`Reconciler::cell_at`].

#[cfg(test)]
#[path = "reconciler_test.rs"]
mod reconciler_test;

use crate::codec;
use crate::consts::BACKGROUND_COLOR;
use crate::event::ChannelEvent;
use crate::grid::{BoardId, Grid};
use crate::store::{BoardRow, PixelOwner};

/// What a cell shows. An image hides the color underneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Color(u16),
    Image(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("snapshot arrived after local placements on board {0}")]
    StaleSnapshot(BoardId),
    #[error("snapshot has {actual} cells, board has {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Decoded snapshot columns, each exactly `size * size` long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub cells: Vec<u16>,
    pub owners: Vec<Option<String>>,
    pub images: Vec<Option<String>>,
    pub version: i64,
}

impl Snapshot {
    #[must_use]
    pub fn empty(grid: Grid) -> Self {
        Self {
            cells: vec![BACKGROUND_COLOR; grid.cell_count()],
            owners: vec![None; grid.cell_count()],
            images: vec![None; grid.cell_count()],
            version: 0,
        }
    }

    /// Decode a stored row for `grid`. Each column that is missing or
    /// malformed falls back to its empty default on its own.
    #[must_use]
    pub fn from_row(row: &BoardRow, grid: Grid) -> Self {
        let mut snapshot = Self::empty(grid);
        snapshot.version = row.version;
        if let Some(cells) = row.data.as_deref().and_then(|d| codec::decode_cells(d, grid)) {
            snapshot.cells = cells;
        }
        if let Some(owners) = row.owners_json.as_deref().and_then(|j| codec::decode_sparse(j, grid)) {
            snapshot.owners = owners;
        }
        if let Some(images) = row.images_json.as_deref().and_then(|j| codec::decode_sparse(j, grid)) {
            snapshot.images = images;
        }
        snapshot
    }

    /// True when the row carried a usable cell blob.
    #[must_use]
    pub fn row_has_cells(row: &BoardRow, grid: Grid) -> bool {
        row.data
            .as_deref()
            .is_some_and(|d| codec::decode_cells(d, grid).is_some())
    }
}

pub struct Reconciler {
    board_id: BoardId,
    grid: Grid,
    cells: Vec<u16>,
    owners: Vec<Option<String>>,
    images: Vec<Option<String>>,
    version: i64,
    local_writes: usize,
}

impl Reconciler {
    #[must_use]
    pub fn new(board_id: BoardId, size: u32) -> Self {
        let grid = Grid::new(size);
        let empty = Snapshot::empty(grid);
        Self {
            board_id,
            grid,
            cells: empty.cells,
            owners: empty.owners,
            images: empty.images,
            version: 0,
            local_writes: 0,
        }
    }

    /// Discard all state for a new board or size.
    pub fn reset(&mut self, board_id: BoardId, size: u32) {
        *self = Self::new(board_id, size);
    }

    #[must_use]
    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    #[must_use]
    pub fn grid(&self) -> Grid {
        self.grid
    }

    #[must_use]
    pub fn cells(&self) -> &[u16] {
        &self.cells
    }

    #[must_use]
    pub fn owners(&self) -> &[Option<String>] {
        &self.owners
    }

    #[must_use]
    pub fn images(&self) -> &[Option<String>] {
        &self.images
    }

    /// Version of the last snapshot loaded or written.
    #[must_use]
    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    /// Apply the user's own placement. Returns the touched index, or `None`
    /// when the coordinates are off the board or the event is not a
    /// placement. Admission is the caller's job.
    pub fn apply_local_placement(&mut self, event: &ChannelEvent) -> Option<usize> {
        let idx = self.apply(event)?;
        self.local_writes += 1;
        Some(idx)
    }

    /// Apply a placement received from a peer.
    pub fn apply_remote_event(&mut self, event: &ChannelEvent) -> Option<usize> {
        self.apply(event)
    }

    /// Replace all state with a stored snapshot.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::StaleSnapshot`] once a local placement has been
    /// applied since the last reset, since the snapshot would erase it.
    /// [`ReconcileError::SizeMismatch`] when the columns do not fit the grid.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) -> Result<(), ReconcileError> {
        if self.local_writes > 0 {
            return Err(ReconcileError::StaleSnapshot(self.board_id));
        }
        let expected = self.grid.cell_count();
        for actual in [snapshot.cells.len(), snapshot.owners.len(), snapshot.images.len()] {
            if actual != expected {
                return Err(ReconcileError::SizeMismatch { expected, actual });
            }
        }
        self.cells = snapshot.cells;
        self.owners = snapshot.owners;
        self.images = snapshot.images;
        self.version = snapshot.version;
        Ok(())
    }

    /// Fill owners the snapshot left empty from per-pixel records.
    /// Returns how many cells were filled.
    pub fn fill_missing_owners(&mut self, records: &[PixelOwner]) -> usize {
        let mut filled = 0;
        for record in records {
            let Some(owner) = record.owner.as_deref().filter(|o| !o.is_empty()) else {
                continue;
            };
            let Some(slot) = self.owners.get_mut(record.idx as usize) else {
                continue;
            };
            if slot.is_none() {
                *slot = Some(owner.to_owned());
                filled += 1;
            }
        }
        filled
    }

    /// Attributed owner of a cell, if any.
    #[must_use]
    pub fn owner_at(&self, x: i64, y: i64) -> Option<&str> {
        let idx = self.grid.index(x, y)?;
        self.owners[idx].as_deref()
    }

    /// What the cell shows, or `None` off the board.
    #[must_use]
    pub fn cell_at(&self, x: i64, y: i64) -> Option<Cell> {
        let idx = self.grid.index(x, y)?;
        Some(match &self.images[idx] {
            Some(url) => Cell::Image(url.clone()),
            None => Cell::Color(self.cells[idx]),
        })
    }

    /// Full row for persistence, stamped with the current version.
    #[must_use]
    pub fn encode_snapshot(&self) -> BoardRow {
        BoardRow {
            id: self.board_id,
            size: self.grid.size(),
            data: Some(codec::encode_cells(&self.cells)),
            owners_json: Some(codec::encode_sparse(&self.owners)),
            images_json: Some(codec::encode_sparse(&self.images)),
            version: self.version,
        }
    }

    /// Merge a stored snapshot that won a write race with local state.
    ///
    /// `idx` always carries the local cell. Every other cell takes the
    /// stored value unless the stored cell is blank and the local one is
    /// not, which keeps peer placements seen live but not yet written.
    /// Stamped with the stored version.
    #[must_use]
    pub fn rebase(&self, stored: &Snapshot, idx: usize) -> Snapshot {
        let mut merged = stored.clone();
        let expected = self.cells.len();
        if merged.cells.len() != expected || merged.owners.len() != expected || merged.images.len() != expected {
            return merged;
        }
        for i in 0..self.cells.len() {
            let stored_blank =
                merged.cells[i] == BACKGROUND_COLOR && merged.owners[i].is_none() && merged.images[i].is_none();
            if i == idx || (stored_blank && !self.is_blank(i)) {
                merged.cells[i] = self.cells[i];
                merged.owners[i].clone_from(&self.owners[i]);
                merged.images[i].clone_from(&self.images[i]);
            }
        }
        merged
    }

    /// Row for [`Reconciler::rebase`] of `stored` around `idx`.
    #[must_use]
    pub fn rebased_row(&self, stored: &Snapshot, idx: usize) -> BoardRow {
        self.snapshot_row(&self.rebase(stored, idx))
    }

    /// Encode `snapshot` as a row of this board, stamped with its version.
    #[must_use]
    pub fn snapshot_row(&self, snapshot: &Snapshot) -> BoardRow {
        BoardRow {
            id: self.board_id,
            size: self.grid.size(),
            data: Some(codec::encode_cells(&snapshot.cells)),
            owners_json: Some(codec::encode_sparse(&snapshot.owners)),
            images_json: Some(codec::encode_sparse(&snapshot.images)),
            version: snapshot.version,
        }
    }

    /// Take a merged snapshot after it was written as `version`. Unlike
    /// [`Reconciler::apply_snapshot`] this is accepted after local
    /// placements, since the merge already carries them. Columns that do
    /// not fit the grid are ignored.
    pub fn adopt_rebase(&mut self, merged: Snapshot, version: i64) {
        let expected = self.grid.cell_count();
        if merged.cells.len() == expected && merged.owners.len() == expected && merged.images.len() == expected {
            self.cells = merged.cells;
            self.owners = merged.owners;
            self.images = merged.images;
        }
        self.version = version;
    }

    fn is_blank(&self, idx: usize) -> bool {
        self.cells[idx] == BACKGROUND_COLOR && self.owners[idx].is_none() && self.images[idx].is_none()
    }

    fn apply(&mut self, event: &ChannelEvent) -> Option<usize> {
        match event {
            ChannelEvent::Pixel(p) => {
                let idx = self.grid.index(p.x, p.y)?;
                self.cells[idx] = p.color_index;
                self.owners[idx].clone_from(&p.owner);
                Some(idx)
            }
            ChannelEvent::Image(i) => {
                let idx = self.grid.index(i.x, i.y)?;
                self.images[idx] = Some(i.url.clone());
                self.owners[idx].clone_from(&i.owner);
                Some(idx)
            }
            ChannelEvent::Active(_) => None,
        }
    }
}
