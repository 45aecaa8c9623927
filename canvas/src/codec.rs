//! Snapshot encoding.
//!
//! The cell grid travels as a fixed-width blob (one little-endian `u16` per
//! cell) wrapped in standard base64. Owner and image maps travel as sparse
//! JSON objects keyed by the decimal cell index.
//!
//! Decoding never fails loudly: anything malformed comes back as `None` and
//! the caller falls back to an empty board.

#[cfg(test)]
#[path = "codec_test.rs"]
mod codec_test;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value};

use crate::consts::BYTES_PER_CELL;
use crate::grid::Grid;

/// Encode cells as base64 of their little-endian bytes.
#[must_use]
pub fn encode_cells(cells: &[u16]) -> String {
    let mut bytes = Vec::with_capacity(cells.len() * BYTES_PER_CELL);
    for cell in cells {
        bytes.extend_from_slice(&cell.to_le_bytes());
    }
    STANDARD.encode(bytes)
}

/// Decode a blob produced by [`encode_cells`].
///
/// Returns `None` for invalid base64 or when the decoded byte count is not
/// exactly `size * size * 2`.
#[must_use]
pub fn decode_cells(blob: &str, grid: Grid) -> Option<Vec<u16>> {
    let bytes = match STANDARD.decode(blob.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return None,
    };
    if bytes.len() != grid.cell_count() * BYTES_PER_CELL {
        return None;
    }
    Some(
        bytes
            .chunks_exact(BYTES_PER_CELL)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect(),
    )
}

/// Encode a dense per-cell column as a sparse `{"idx": "value"}` object.
/// Empty strings are treated as absent.
#[must_use]
pub fn encode_sparse(values: &[Option<String>]) -> String {
    let mut map = Map::new();
    for (idx, value) in values.iter().enumerate() {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            map.insert(idx.to_string(), Value::String(value.to_owned()));
        }
    }
    Value::Object(map).to_string()
}

/// Decode a sparse map into a dense column of `size * size` entries.
///
/// Returns `None` when the text is not a JSON object. Keys that are not
/// in-range indices and values that are not non-empty strings are skipped.
#[must_use]
pub fn decode_sparse(json: &str, grid: Grid) -> Option<Vec<Option<String>>> {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(json) else {
        return None;
    };
    let mut out = vec![None; grid.cell_count()];
    for (key, value) in map {
        let Ok(idx) = key.parse::<usize>() else {
            continue;
        };
        if !grid.contains(idx) {
            continue;
        }
        if let Value::String(text) = value {
            if !text.is_empty() {
                out[idx] = Some(text);
            }
        }
    }
    Some(out)
}
