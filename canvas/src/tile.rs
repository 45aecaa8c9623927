//! Image tiles and color swatches.
//!
//! A tile is any decodable image, center-cropped to a square (cover fit) and
//! resampled to a fixed side, then encoded as PNG. Swatches are solid PNG
//! squares of one palette color.

#[cfg(test)]
#[path = "tile_test.rs"]
mod tile_test;

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

#[derive(Debug, thiserror::Error)]
pub enum TileError {
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("image has no pixels")]
    Empty,
    #[error("failed to encode png: {0}")]
    Encode(String),
    #[error("invalid color {0:?}")]
    InvalidColor(String),
}

/// Cover-fit `bytes` into a `side × side` PNG.
///
/// # Errors
///
/// [`TileError::Decode`] for unreadable input, [`TileError::Empty`] for a
/// zero-sized image, [`TileError::Encode`] if PNG encoding fails.
pub fn resample_tile(bytes: &[u8], side: u32) -> Result<Vec<u8>, TileError> {
    let source = image::load_from_memory(bytes).map_err(|e| TileError::Decode(e.to_string()))?;
    let (width, height) = (source.width(), source.height());
    if width == 0 || height == 0 || side == 0 {
        return Err(TileError::Empty);
    }
    let crop = width.min(height);
    let square = source.crop_imm((width - crop) / 2, (height - crop) / 2, crop, crop);
    let tile = square.resize_exact(side, side, FilterType::Triangle);
    encode_png(&DynamicImage::ImageRgba8(tile.to_rgba8()))
}

/// Solid `side × side` PNG of a `#RRGGBB` color.
///
/// # Errors
///
/// [`TileError::InvalidColor`] for anything that is not `#RRGGBB`.
pub fn render_swatch(hex: &str, side: u32) -> Result<Vec<u8>, TileError> {
    let [r, g, b] = parse_hex_color(hex)?;
    let swatch = RgbaImage::from_pixel(side, side, Rgba([r, g, b, 255]));
    encode_png(&DynamicImage::ImageRgba8(swatch))
}

/// Parse `#RRGGBB` (leading `#` optional, case-insensitive).
///
/// # Errors
///
/// [`TileError::InvalidColor`] for any other shape.
pub fn parse_hex_color(hex: &str) -> Result<[u8; 3], TileError> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(TileError::InvalidColor(hex.to_owned()));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| TileError::InvalidColor(hex.to_owned()))
    };
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, TileError> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| TileError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}
