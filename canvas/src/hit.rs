//! Screen-point to cell mapping.
//!
//! The board is drawn square, centered, at the largest whole-pixel cell
//! size that fits the viewport. Points in the letterbox around it hit
//! nothing.

#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::grid::Grid;

/// Size of the element the board is drawn into, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Integer on-screen pixel size of one cell and the top-left board origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub cell_px: i64,
    pub origin_x: i64,
    pub origin_y: i64,
}

/// Fit the board into the viewport at the largest whole-pixel scale (at
/// least 1) and center it.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn layout(grid: Grid, viewport: Viewport) -> Layout {
    let side = f64::from(grid.size().max(1));
    let cell_px = ((viewport.width / side).min(viewport.height / side).floor() as i64).max(1);
    let board_px = cell_px * i64::from(grid.size());
    Layout {
        cell_px,
        origin_x: ((viewport.width.floor() as i64) - board_px).div_euclid(2),
        origin_y: ((viewport.height.floor() as i64) - board_px).div_euclid(2),
    }
}

/// Cell under a point given relative to the viewport's top-left corner.
/// Returns `(x, y, idx)`, or `None` when the point misses the board.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn canvas_to_cell(grid: Grid, viewport: Viewport, px: f64, py: f64) -> Option<(i64, i64, usize)> {
    if !px.is_finite() || !py.is_finite() {
        return None;
    }
    let layout = layout(grid, viewport);
    let x = (px.floor() as i64).saturating_sub(layout.origin_x).div_euclid(layout.cell_px);
    let y = (py.floor() as i64).saturating_sub(layout.origin_y).div_euclid(layout.cell_px);
    let idx = grid.index(x, y)?;
    Some((x, y, idx))
}
