// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Tile-count arithmetic.
//!
//! Converts between bit counts, recursion depths, module sizes and tile
//! spans. Everything here is pure integer math shared by encoder and decoder.

use crate::overlay::carrier::RESERVED_HEADER_TILES;
use crate::overlay::tile::bits_per_tile;

/// Module side needed for tiles of `depth`.
///
/// Depth 1 uses the configured `base`; deeper tiles use `3^(depth+1)` so
/// every leaf cell keeps a 3 px sampling window.
pub fn module_size_for_depth(depth: u8, base: u32) -> u32 {
    if depth <= 1 {
        base
    } else {
        3u32.pow(depth as u32 + 1)
    }
}

/// Tiles needed to carry `bits` at `depth`.
pub fn tiles_for_bits(bits: usize, depth: u8) -> usize {
    bits.div_ceil(bits_per_tile(depth))
}

/// Secret payload bits that still fit a carrier with `dark_tiles` tiles once
/// the header, filler and overlay reservation spans are subtracted.
///
/// The result is conservative: it keeps [`RESERVED_HEADER_TILES`] free, as
/// carrier selection does.
pub fn secret_capacity_bits(
    dark_tiles: usize,
    header_tiles: usize,
    filler_tiles: usize,
    reserved_tiles: usize,
    depth: u8,
) -> usize {
    let overhead = header_tiles + filler_tiles + reserved_tiles + RESERVED_HEADER_TILES;
    dark_tiles.saturating_sub(overhead) * bits_per_tile(depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_sizes() {
        assert_eq!(module_size_for_depth(0, 10), 10);
        assert_eq!(module_size_for_depth(1, 10), 10);
        assert_eq!(module_size_for_depth(2, 10), 27);
        assert_eq!(module_size_for_depth(3, 10), 81);
    }

    #[test]
    fn tile_counts_round_up() {
        assert_eq!(tiles_for_bits(0, 1), 0);
        assert_eq!(tiles_for_bits(8, 1), 1);
        assert_eq!(tiles_for_bits(9, 1), 2);
        assert_eq!(tiles_for_bits(512, 2), 8);
        assert_eq!(tiles_for_bits(513, 3), 2);
    }

    #[test]
    fn capacity_saturates() {
        assert_eq!(secret_capacity_bits(10, 20, 5, 0, 1), 0);
        assert_eq!(secret_capacity_bits(100, 40, 6, 8, 1), (100 - 56) * 8);
        assert_eq!(secret_capacity_bits(100, 40, 6, 8, 2), (100 - 56) * 64);
    }
}
