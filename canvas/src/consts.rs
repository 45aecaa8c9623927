//! Shared constants for the canvas crate.

use std::time::Duration;

// ── Board ───────────────────────────────────────────────────────

/// Side length of the boards seeded by the server.
pub const DEFAULT_BOARD_SIZE: u32 = 32;

/// Bytes per cell in the encoded snapshot blob (little-endian `u16`).
pub const BYTES_PER_CELL: usize = 2;

/// Color index of an untouched cell.
pub const BACKGROUND_COLOR: u16 = 0;

/// Default palette. Index 0 is the background.
pub const DEFAULT_PALETTE: [&str; 10] = [
    "#000000", "#FFFFFF", "#00F7FF", "#FF3CF7", "#F9FF00", "#00FFA3", "#38B6FF", "#FF6B00", "#8A2BE2", "#FF007F",
];

// ── Admission ───────────────────────────────────────────────────

/// Placement cooldown, armed after every successful placement.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3);

// ── Presence ────────────────────────────────────────────────────

/// An identity with no observed event for longer than this is inactive.
pub const ACTIVITY_WINDOW: Duration = Duration::from_secs(3 * 60);

/// Interval of the periodic presence prune.
pub const PRESENCE_TICK: Duration = Duration::from_secs(5);

/// Presence key used when a client has not configured one.
pub const ANONYMOUS_KEY: &str = "anon";

// ── Tiles ───────────────────────────────────────────────────────

/// Side length of a placeable image tile.
pub const TILE_SIZE: u32 = 32;

/// Side length of the solid swatch rendered for a color placement.
pub const SWATCH_SIZE: u32 = 64;

// ── Identity ────────────────────────────────────────────────────

pub const DISPLAY_NAME_MIN: usize = 2;
pub const DISPLAY_NAME_MAX: usize = 40;

// ── Ticker ──────────────────────────────────────────────────────

/// Number of ticker lines retained.
pub const TICKER_CAPACITY: usize = 25;
