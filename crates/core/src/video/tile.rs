//! 2bpp tile format.
//!
//! Each 8x8 tile is 16 bytes with interleaved bitplanes:
//! - Byte 2i: low bit of every pixel in row i
//! - Byte 2i+1: high bit of every pixel in row i
//!
//! Column 7 is the least significant bit of each byte, column 0 the most.

/// Bytes per tile
pub const TILE_BYTES: usize = 16;

/// One decoded tile image
pub type TileData = [u8; TILE_BYTES];

/// Palette index (0-3) of one pixel.
///
/// Out-of-range coordinates decode as 0.
pub fn decode_pixel(tile: &[u8], x: u8, y: u8) -> u8 {
    if tile.len() < TILE_BYTES || x > 7 || y > 7 {
        return 0;
    }

    let row_offset = (y as usize) * 2;
    let lo = tile[row_offset];
    let hi = tile[row_offset + 1];
    let bit = 7 - x;
    let lo_bit = (lo >> bit) & 1;
    let hi_bit = (hi >> bit) & 1;

    (hi_bit << 1) | lo_bit
}

/// Encode 64 palette indices (row-major) into the interleaved format.
#[cfg(test)]
pub(crate) fn encode(pixels: &[u8; 64]) -> TileData {
    let mut tile = [0u8; TILE_BYTES];
    for y in 0..8 {
        for x in 0..8 {
            let px = pixels[y * 8 + x] & 0x03;
            let bit = 7 - x;
            tile[y * 2] |= (px & 1) << bit;
            tile[y * 2 + 1] |= ((px >> 1) & 1) << bit;
        }
    }
    tile
}

/// A tile filled with a single palette index
pub const fn solid(index: u8) -> TileData {
    let lo = if index & 1 != 0 { 0xFF } else { 0x00 };
    let hi = if index & 2 != 0 { 0xFF } else { 0x00 };
    [
        lo, hi, lo, hi, lo, hi, lo, hi, lo, hi, lo, hi, lo, hi, lo, hi,
    ]
}

/// A one-bit bitmap (one byte per row, MSB leftmost) drawn in palette
/// index `index` over index 0.
pub const fn mono(rows: [u8; 8], index: u8) -> TileData {
    let mut tile = [0u8; TILE_BYTES];
    let mut y = 0;
    while y < 8 {
        if index & 1 != 0 {
            tile[y * 2] = rows[y];
        }
        if index & 2 != 0 {
            tile[y * 2 + 1] = rows[y];
        }
        y += 1;
    }
    tile
}

/// A game's static tile artwork: consecutive tiles starting at `first`.
#[derive(Debug, Clone, Copy)]
pub struct TileBundle {
    pub first: u8,
    pub tiles: &'static [TileData],
}

impl TileBundle {
    pub const fn new(first: u8, tiles: &'static [TileData]) -> Self {
        Self { first, tiles }
    }

    /// (index, data) pairs in load order
    pub fn iter(&self) -> impl Iterator<Item = (u8, &TileData)> + '_ {
        self.tiles
            .iter()
            .enumerate()
            .map(move |(i, t)| (self.first.wrapping_add(i as u8), t))
    }
}
