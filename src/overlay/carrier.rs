// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Carrier layout: which barcode modules carry tiles, and in which order.
//!
//! The barcode itself comes from an external generator behind
//! [`MatrixGenerator`]. Once rendered, the image is the only source of truth:
//! a module is a carrier tile when its mean luma is below the dark
//! threshold, and tiles are numbered in row-major scan order by
//! [`enumerate_dark_tiles`]. Encoder and decoder both derive tile indices
//! from pixels, never from the matrix, so they cannot disagree.

use std::error::Error;

use tracing::{debug, info};

use crate::overlay::error::{OverlayError, Result};
use crate::raster::{Canvas, BLACK, WHITE};

/// Tiles added on top of the payload span when sizing a carrier.
pub const RESERVED_HEADER_TILES: usize = 2;

/// Error correction level used for every issued carrier.
pub const CARRIER_ECC: ErrorCorrection = ErrorCorrection::Quartile;

/// Barcode error correction levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCorrection {
    Low,
    Medium,
    Quartile,
    High,
}

/// Square boolean module grid produced by a [`MatrixGenerator`], quiet zone
/// included. `true` is a dark module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CarrierMatrix {
    size: usize,
    cells: Vec<bool>,
}

impl CarrierMatrix {
    /// Build a matrix from rows. All rows must have the same length as the
    /// number of rows.
    pub fn from_rows(rows: Vec<Vec<bool>>) -> Result<Self> {
        let size = rows.len();
        if size == 0 {
            return Err(OverlayError::Matrix("empty matrix".into()));
        }
        let mut cells = Vec::with_capacity(size * size);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != size {
                return Err(OverlayError::Matrix(format!(
                    "row {i} has {} modules, expected {size}",
                    row.len()
                )));
            }
            cells.extend(row);
        }
        Ok(Self { size, cells })
    }

    /// Modules per side.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_dark(&self, col: usize, row: usize) -> bool {
        self.cells[row * self.size + col]
    }

    pub fn dark_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}

/// Errors reported by external matrix collaborators.
pub type MatrixError = Box<dyn Error + Send + Sync>;

/// Produces the public barcode for a payload at a given version.
pub trait MatrixGenerator {
    /// Build the module matrix for `payload`. Fails when the payload does
    /// not fit the version.
    fn build_matrix(
        &self,
        payload: &str,
        version: u8,
        ecc: ErrorCorrection,
    ) -> std::result::Result<CarrierMatrix, MatrixError>;
}

/// Reads the public payload back out of a rendered image.
pub trait MatrixReader {
    fn decode_matrix(&self, canvas: &Canvas) -> Option<String>;
}

/// Module-grid coordinate of a carrier tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TilePos {
    pub col: u32,
    pub row: u32,
}

impl TilePos {
    /// Pixel origin of this tile.
    pub fn origin(self, module_size: u32) -> (u32, u32) {
        (self.col * module_size, self.row * module_size)
    }
}

/// True when the mean luma of the `size`x`size` region at `(x, y)` is below
/// `threshold`. The region must lie inside the canvas.
pub fn is_dark(canvas: &Canvas, x: u32, y: u32, size: u32, threshold: f64) -> bool {
    canvas.mean_luma(x, y, size, size) < threshold
}

/// All dark modules of a `module_size` grid in row-major order.
///
/// Partial modules at the right and bottom edges are ignored.
pub fn enumerate_dark_tiles(canvas: &Canvas, module_size: u32, threshold: f64) -> Vec<TilePos> {
    if module_size == 0 {
        return Vec::new();
    }
    let cols = canvas.width() / module_size;
    let rows = canvas.height() / module_size;
    let mut tiles = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            if is_dark(canvas, col * module_size, row * module_size, module_size, threshold) {
                tiles.push(TilePos { col, row });
            }
        }
    }
    tiles
}

/// Outcome of [`select_carrier`].
#[derive(Clone, Debug)]
pub struct SelectedCarrier {
    pub version: u8,
    pub matrix: CarrierMatrix,
    pub dark_tiles: usize,
    /// Tiles the caller asked for, including the header reserve.
    pub required_tiles: usize,
}

/// Find the smallest version whose matrix has enough dark modules for
/// `required_bits` at `bits_per_tile`, plus [`RESERVED_HEADER_TILES`].
///
/// Versions the generator rejects are skipped. Fails with `NoCapacity` when
/// no version up to `max_version` fits, or `Matrix` when the generator
/// rejected every version.
pub fn select_carrier<G: MatrixGenerator + ?Sized>(
    generator: &G,
    required_bits: usize,
    payload: &str,
    bits_per_tile: usize,
    max_version: u8,
) -> Result<SelectedCarrier> {
    let required_tiles = required_bits.div_ceil(bits_per_tile.max(1)) + RESERVED_HEADER_TILES;
    let mut best_available = 0;
    let mut last_error = None;
    let mut built_any = false;

    for version in 1..=max_version {
        let matrix = match generator.build_matrix(payload, version, CARRIER_ECC) {
            Ok(m) => m,
            Err(e) => {
                debug!(version, error = %e, "carrier version rejected by generator");
                last_error = Some(e.to_string());
                continue;
            }
        };
        built_any = true;
        let dark_tiles = matrix.dark_count();
        best_available = best_available.max(dark_tiles);
        if dark_tiles >= required_tiles {
            info!(version, dark_tiles, required_tiles, "carrier selected");
            return Ok(SelectedCarrier { version, matrix, dark_tiles, required_tiles });
        }
        debug!(version, dark_tiles, required_tiles, "carrier too small");
    }

    match last_error {
        Some(reason) if !built_any => Err(OverlayError::Matrix(reason)),
        _ => Err(OverlayError::NoCapacity { required_tiles, max_version, best_available }),
    }
}

/// Render a matrix as a black-on-white image with `module_size` px modules.
pub fn render_carrier(matrix: &CarrierMatrix, module_size: u32) -> Result<Canvas> {
    let side = matrix.size() as u32 * module_size;
    let mut canvas = Canvas::new(side, side, WHITE)?;
    for row in 0..matrix.size() {
        for col in 0..matrix.size() {
            if matrix.is_dark(col, row) {
                canvas.fill_rect(
                    col as u32 * module_size,
                    row as u32 * module_size,
                    module_size,
                    module_size,
                    BLACK,
                );
            }
        }
    }
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Version `v` is a `v+2` square whose dark modules form a checkerboard.
    struct Checkerboard;

    impl MatrixGenerator for Checkerboard {
        fn build_matrix(
            &self,
            payload: &str,
            version: u8,
            _ecc: ErrorCorrection,
        ) -> std::result::Result<CarrierMatrix, MatrixError> {
            if payload.len() > version as usize * 4 {
                return Err("payload too long for version".into());
            }
            let n = version as usize + 2;
            let rows = (0..n).map(|r| (0..n).map(|c| (r + c) % 2 == 0).collect()).collect();
            Ok(CarrierMatrix::from_rows(rows)?)
        }
    }

    #[test]
    fn matrix_rejects_ragged_rows() {
        assert!(CarrierMatrix::from_rows(vec![vec![true, false], vec![true]]).is_err());
        assert!(CarrierMatrix::from_rows(vec![]).is_err());
    }

    #[test]
    fn dark_tiles_in_row_major_order() {
        let m = CarrierMatrix::from_rows(vec![
            vec![false, true, true],
            vec![true, false, false],
            vec![false, false, true],
        ])
        .unwrap();
        let canvas = render_carrier(&m, 4).unwrap();
        let tiles = enumerate_dark_tiles(&canvas, 4, 80.0);
        let coords: Vec<_> = tiles.iter().map(|t| (t.col, t.row)).collect();
        assert_eq!(coords, vec![(1, 0), (2, 0), (0, 1), (2, 2)]);
        assert_eq!(tiles[3].origin(4), (8, 8));
    }

    #[test]
    fn first_fitting_version_wins() {
        // version v has ceil((v+2)^2 / 2) dark modules: 5, 8, 13, 18, ...
        let sel = select_carrier(&Checkerboard, 6 * 8, "", 8, 10).unwrap();
        assert_eq!(sel.required_tiles, 8);
        assert_eq!(sel.version, 2);
        assert!(sel.dark_tiles >= sel.required_tiles);
    }

    #[test]
    fn rejected_versions_are_skipped() {
        let sel = select_carrier(&Checkerboard, 8, "0123456789", 8, 10).unwrap();
        assert_eq!(sel.version, 3);
    }

    #[test]
    fn no_capacity_past_max_version() {
        match select_carrier(&Checkerboard, 10_000, "", 8, 3) {
            Err(OverlayError::NoCapacity { max_version: 3, best_available: 13, .. }) => {}
            other => panic!("expected NoCapacity, got {other:?}"),
        }
    }

    #[test]
    fn generator_failing_everywhere_is_matrix_error() {
        let long = "x".repeat(100);
        assert!(matches!(select_carrier(&Checkerboard, 8, &long, 8, 5), Err(OverlayError::Matrix(_))));
    }
}
