// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Header record.
//!
//! The header is a compact JSON object painted one byte per tile at depth 1,
//! starting at carrier tile 0. It has no length prefix: the decoder reads a
//! window of tiles and takes the text between the first `{` and the first
//! `}` after it. Anything around the braces is ignored, which lets older
//! encoders pad the record without breaking decoding.
//!
//! ```text
//! {"depth":1,"bit_length":136,"bits_per_tile":8,"filler_bits":48,
//!  "module_size":10,"reserve_bits":0,"asserter_max_depth":null,...}
//! ```

use serde::{Deserialize, Serialize};

use crate::overlay::error::{OverlayError, Result};
use crate::overlay::tile::{bits_per_tile, MAX_TILE_DEPTH};

/// Layout metadata for one image. Field order is the wire key order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Recursion depth of the secret payload tiles.
    pub depth: u8,
    /// Exact bit count of the secret payload.
    pub bit_length: usize,
    #[serde(default)]
    pub bits_per_tile: Option<usize>,
    #[serde(default)]
    pub filler_bits: Option<usize>,
    #[serde(default)]
    pub module_size: Option<u32>,
    #[serde(default)]
    pub reserve_bits: Option<usize>,
    #[serde(default)]
    pub asserter_max_depth: Option<u8>,
    #[serde(default)]
    pub asserter_bits_per_tile: Option<usize>,
    #[serde(default)]
    pub asserter_module_size: Option<u32>,
    #[serde(default)]
    pub asserter_reserve_bits: Option<usize>,
}

impl Header {
    /// Header for a secret of `bit_length` bits at `depth`, without an
    /// overlay reservation.
    pub fn new(depth: u8, bit_length: usize, filler_bits: usize, module_size: u32) -> Self {
        Self {
            depth,
            bit_length,
            bits_per_tile: Some(bits_per_tile(depth)),
            filler_bits: Some(filler_bits),
            module_size: Some(module_size),
            reserve_bits: Some(0),
            asserter_max_depth: None,
            asserter_bits_per_tile: None,
            asserter_module_size: None,
            asserter_reserve_bits: None,
        }
    }

    /// Record an overlay reservation of `reserve_bits`, appendable at up to
    /// `max_depth`.
    pub fn with_reservation(mut self, reserve_bits: usize, max_depth: Option<u8>) -> Self {
        self.reserve_bits = Some(reserve_bits);
        if reserve_bits > 0 || max_depth.is_some() {
            self.asserter_reserve_bits = Some(reserve_bits);
        }
        if let Some(d) = max_depth {
            self.asserter_max_depth = Some(d);
            self.asserter_bits_per_tile = Some(bits_per_tile(d));
            self.asserter_module_size = self.module_size;
        }
        self
    }

    /// Compact JSON encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| OverlayError::HeaderParseError {
            reason: format!("header serialization failed: {e}"),
        })
    }

    pub fn secret_bits_per_tile(&self) -> usize {
        self.bits_per_tile.unwrap_or_else(|| bits_per_tile(self.depth))
    }

    pub fn filler_bits_or(&self, default: usize) -> usize {
        self.filler_bits.unwrap_or(default)
    }

    /// Overlay reservation in bits. `asserter_reserve_bits` wins when it is
    /// non-zero.
    pub fn reserve_bits(&self) -> usize {
        self.asserter_reserve_bits
            .filter(|&b| b > 0)
            .or(self.reserve_bits)
            .unwrap_or(0)
    }

    /// Deepest overlay the issuer allowed. Defaults to 1 when a reservation
    /// was made without naming a depth.
    pub fn overlay_max_depth(&self) -> u8 {
        self.asserter_max_depth.unwrap_or(1)
    }

    fn validate(&self) -> Result<()> {
        if self.depth == 0 || self.depth > MAX_TILE_DEPTH {
            return Err(OverlayError::HeaderParseError {
                reason: format!("depth {} outside 1..={MAX_TILE_DEPTH}", self.depth),
            });
        }
        if let Some(bpt) = self.bits_per_tile {
            if bpt != bits_per_tile(self.depth) {
                return Err(OverlayError::HeaderParseError {
                    reason: format!("bits_per_tile {bpt} does not match depth {}", self.depth),
                });
            }
        }
        if let Some(d) = self.asserter_max_depth {
            if d == 0 || d > MAX_TILE_DEPTH {
                return Err(OverlayError::HeaderParseError {
                    reason: format!("asserter_max_depth {d} outside 1..={MAX_TILE_DEPTH}"),
                });
            }
        }
        Ok(())
    }
}

/// Locate and parse the header in a stream of depth-1 tile bytes.
///
/// Returns the header and the number of tiles it spans (index of the
/// closing brace plus one). Bytes that are not valid UTF-8 inside the braces
/// are dropped before parsing.
pub fn scan_header(bytes: &[u8]) -> Result<(Header, usize)> {
    let open = bytes.iter().position(|&b| b == b'{').ok_or_else(|| OverlayError::HeaderParseError {
        reason: "no '{' in header window".into(),
    })?;
    let close = bytes[open..]
        .iter()
        .position(|&b| b == b'}')
        .map(|p| open + p)
        .ok_or_else(|| OverlayError::HeaderParseError {
            reason: format!("no '}}' after '{{' at tile {open}"),
        })?;

    let text: String = String::from_utf8_lossy(&bytes[open..=close])
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER)
        .collect();
    let header: Header = serde_json::from_str(&text).map_err(|e| OverlayError::HeaderParseError {
        reason: format!("invalid header JSON: {e}"),
    })?;
    header.validate()?;
    Ok((header, close + 1))
}
