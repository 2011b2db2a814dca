// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Shared fixtures: a deterministic stand-in for the barcode generator and
//! reader.

#![allow(dead_code)]

use layerqr_core::{Canvas, CarrierMatrix, ErrorCorrection, MatrixError, MatrixGenerator, MatrixReader};

/// Quiet-zone width in modules on each side.
pub const QUIET_ZONE: usize = 4;

/// Barcode-shaped matrix generator.
///
/// Version `v` has a `17 + 4v` module symbol inside a light quiet zone. The
/// symbol's modules are pseudo-random (about half dark), seeded from the
/// payload and version. A version holds `40 * v` payload bytes.
pub struct SyntheticGenerator;

impl SyntheticGenerator {
    pub fn capacity(version: u8) -> usize {
        40 * version as usize
    }
}

impl MatrixGenerator for SyntheticGenerator {
    fn build_matrix(
        &self,
        payload: &str,
        version: u8,
        _ecc: ErrorCorrection,
    ) -> Result<CarrierMatrix, MatrixError> {
        if payload.len() > Self::capacity(version) {
            return Err(format!("{} bytes do not fit version {version}", payload.len()).into());
        }
        let symbol = 17 + 4 * version as usize;
        let size = symbol + 2 * QUIET_ZONE;
        let mut state = payload
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325u64, |h, b| (h ^ b as u64).wrapping_mul(0x0100_0000_01b3))
            ^ version as u64;
        let mut rows = vec![vec![false; size]; size];
        for row in rows.iter_mut().skip(QUIET_ZONE).take(symbol) {
            for cell in row.iter_mut().skip(QUIET_ZONE).take(symbol) {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                *cell = state & 1 == 1;
            }
        }
        Ok(CarrierMatrix::from_rows(rows)?)
    }
}

/// Reader that returns a fixed payload, or nothing.
pub struct StaticReader(pub Option<String>);

impl MatrixReader for StaticReader {
    fn decode_matrix(&self, _canvas: &Canvas) -> Option<String> {
        self.0.clone()
    }
}
