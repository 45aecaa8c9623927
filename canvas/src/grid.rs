//! Board geometry: the single `idx = y * size + x` mapping.
//!
//! Every consumer (placement, snapshot decode, hit testing, the sparse owner
//! and image maps) goes through [`Grid`] so the mapping cannot drift.

#[cfg(test)]
#[path = "grid_test.rs"]
mod grid_test;

/// Board identifier. Boards are created out-of-band with small integer ids.
pub type BoardId = i64;

/// Name of the realtime scope for a board.
#[must_use]
pub fn channel_name(board_id: BoardId) -> String {
    format!("board-{board_id}")
}

/// Square grid of `size × size` cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    size: u32,
}

impl Grid {
    #[must_use]
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    #[must_use]
    pub fn size(self) -> u32 {
        self.size
    }

    /// Number of cells, `size * size`.
    #[must_use]
    pub fn cell_count(self) -> usize {
        let side = self.size as usize;
        side * side
    }

    /// Flat index for `(x, y)`, or `None` when either coordinate is outside
    /// `0..size`. Accepts signed input so wire values can be checked before
    /// any narrowing.
    #[must_use]
    pub fn index(self, x: i64, y: i64) -> Option<usize> {
        let size = i64::from(self.size);
        if x < 0 || y < 0 || x >= size || y >= size {
            return None;
        }
        // Both coordinates are checked non-negative and below `size`.
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let idx = (y * size + x) as usize;
        Some(idx)
    }

    /// Inverse of [`Grid::index`].
    #[must_use]
    pub fn coords(self, idx: usize) -> Option<(u32, u32)> {
        if !self.contains(idx) {
            return None;
        }
        let side = self.size as usize;
        #[allow(clippy::cast_possible_truncation)]
        let xy = ((idx % side) as u32, (idx / side) as u32);
        Some(xy)
    }

    #[must_use]
    pub fn contains(self, idx: usize) -> bool {
        idx < self.cell_count()
    }
}
