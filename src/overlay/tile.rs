// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Recursive fractal tile codec.
//!
//! A tile of depth `d` carries `8^d` bits in a square pixel region. The
//! region is split 3x3; eight of the nine cells are significant and the
//! centre is never touched:
//!
//! ```text
//! +---+---+---+
//! | 0 | 1 | 2 |
//! +---+---+---+
//! | 3 |   | 4 |
//! +---+---+---+
//! | 5 | 6 | 7 |
//! +---+---+---+
//! ```
//!
//! At depth 1 cell `i` is painted when bit `i` (MSB first) of the single
//! byte is set. At depth `d > 1` the tile takes `8^(d-1)` bytes; cell `i`
//! carries the slice `[i * 8^(d-2), (i + 1) * 8^(d-2))` and is encoded
//! recursively at depth `d - 1`. A cell whose slice is all zero is not
//! descended into, so it stays background and reads back as zero.
//!
//! Sides are divided by 3 with integer division at each level, so a side
//! that is not a multiple of `3^d` leaves an unused margin on the right and
//! bottom. The leaf cell must be at least one pixel wide.

use crate::overlay::bits::bits_to_bytes;
use crate::overlay::error::{OverlayError, Result};
use crate::raster::{Canvas, Rgb};

/// Deepest recursion the codec accepts.
pub const MAX_TILE_DEPTH: u8 = 6;

/// Significant `(col, row)` cells of a 3x3 split, in paint and read order.
pub const BIT_POSITIONS: [(u32, u32); 8] = [
    (0, 0),
    (1, 0),
    (2, 0),
    (0, 1),
    (2, 1),
    (0, 2),
    (1, 2),
    (2, 2),
];

/// Bytes consumed by one tile at `depth` (`8^(depth-1)`).
pub fn bytes_per_tile(depth: u8) -> usize {
    8usize.pow(depth.saturating_sub(1) as u32)
}

/// Bits carried by one tile at `depth` (`8^depth`).
pub fn bits_per_tile(depth: u8) -> usize {
    8usize.pow(depth as u32)
}

/// Side of the leaf cell reached after `depth` splits of `size`.
pub fn leaf_size(size: u32, depth: u8) -> u32 {
    (0..depth).fold(size, |s, _| s / 3)
}

fn check_geometry(canvas: &Canvas, x: u32, y: u32, size: u32, depth: u8) -> Result<()> {
    if depth == 0 || depth > MAX_TILE_DEPTH {
        return Err(OverlayError::TileGeometry(format!(
            "depth {depth} outside 1..={MAX_TILE_DEPTH}"
        )));
    }
    if leaf_size(size, depth) == 0 {
        return Err(OverlayError::TileGeometry(format!(
            "a {size}px tile is too small for depth {depth}"
        )));
    }
    canvas
        .check_region(x, y, size, size)
        .map_err(|e| OverlayError::TileGeometry(e.to_string()))
}

/// Paint `bytes` as a depth-`depth` tile into `canvas` at `(x, y)`.
///
/// Only set bits are painted; everything else keeps the existing pixels.
pub fn paint_tile(
    canvas: &mut Canvas,
    x: u32,
    y: u32,
    size: u32,
    bytes: &[u8],
    depth: u8,
    color: Rgb,
) -> Result<()> {
    check_geometry(canvas, x, y, size, depth)?;
    let expected = bytes_per_tile(depth);
    if bytes.len() != expected {
        return Err(OverlayError::ArityMismatch { depth, expected, actual: bytes.len() });
    }
    let rgba = [color[0], color[1], color[2], 255];
    paint_region(canvas, x, y, size, bytes, depth, rgba);
    Ok(())
}

fn paint_region(canvas: &mut Canvas, x: u32, y: u32, size: u32, bytes: &[u8], depth: u8, rgba: [u8; 4]) {
    let cell = size / 3;
    if depth == 1 {
        let byte = bytes[0];
        for (i, &(col, row)) in BIT_POSITIONS.iter().enumerate() {
            if (byte >> (7 - i)) & 1 == 1 {
                canvas.fill_rect(x + col * cell, y + row * cell, cell, cell, rgba);
            }
        }
        return;
    }
    let sub = bytes_per_tile(depth - 1);
    for (i, &(col, row)) in BIT_POSITIONS.iter().enumerate() {
        let slice = &bytes[i * sub..(i + 1) * sub];
        if slice.iter().any(|&b| b != 0) {
            paint_region(canvas, x + col * cell, y + row * cell, cell, slice, depth - 1, rgba);
        }
    }
}

/// Encode `bytes` as a standalone `size`x`size` tile on a transparent
/// background.
pub fn encode_tile(bytes: &[u8], size: u32, depth: u8, color: Rgb) -> Result<Canvas> {
    let mut tile = Canvas::transparent(size, size)?;
    paint_tile(&mut tile, 0, 0, size, bytes, depth, color)?;
    Ok(tile)
}

/// Decode the depth-`depth` tile at `(x, y)` into `8^depth / 8` bytes.
///
/// Each leaf cell is sampled over its inner third (the whole cell when it
/// is narrower than 3 px); a mean RGB above `threshold` reads as 1.
pub fn decode_tile(canvas: &Canvas, x: u32, y: u32, size: u32, depth: u8, threshold: f64) -> Result<Vec<u8>> {
    check_geometry(canvas, x, y, size, depth)?;
    let mut bits = Vec::with_capacity(bits_per_tile(depth));
    read_region(canvas, x, y, size, depth, threshold, &mut bits);
    Ok(bits_to_bytes(&bits))
}

fn read_region(canvas: &Canvas, x: u32, y: u32, size: u32, depth: u8, threshold: f64, bits: &mut Vec<u8>) {
    let cell = size / 3;
    for &(col, row) in BIT_POSITIONS.iter() {
        let (cx, cy) = (x + col * cell, y + row * cell);
        if depth == 1 {
            bits.push(sample_leaf(canvas, cx, cy, cell, threshold) as u8);
        } else {
            read_region(canvas, cx, cy, cell, depth - 1, threshold, bits);
        }
    }
}

fn sample_leaf(canvas: &Canvas, x: u32, y: u32, cell: u32, threshold: f64) -> bool {
    let (sx, sy, side) = if cell >= 3 {
        (x + cell / 3, y + cell / 3, cell / 3)
    } else {
        (x, y, cell)
    };
    canvas.mean_rgb(sx, sy, side, side) > threshold
}
