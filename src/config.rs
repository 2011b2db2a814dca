// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Codec configuration.
//!
//! Every tunable that encoder and decoder must agree on lives in
//! [`CodecConfig`]. The defaults are the values baked into issued images, so
//! changing them on one side only breaks decoding of existing images.
//! Configuration can be loaded from TOML; missing keys take the defaults.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::raster::{luma, Rgb};

/// Tiles of decoy bytes between header and secret payload.
pub const DEFAULT_FILLER_TILE_COUNT: usize = 100;
/// Module side in pixels for depth-1 images.
pub const DEFAULT_MODULE_SIZE: u32 = 10;
/// Module sizes probed when the header's own module size is not yet known.
pub const DEFAULT_MODULE_SIZE_CANDIDATES: [u32; 3] = [10, 27, 81];
/// A tile whose mean luma is below this is a dark carrier tile.
pub const DEFAULT_DARK_THRESHOLD: f64 = 80.0;
/// A leaf sample whose mean RGB exceeds this reads as a set bit.
pub const DEFAULT_BIT_THRESHOLD: f64 = 50.0;
/// Dark tiles read at depth 1 while looking for the header record.
pub const DEFAULT_HEADER_SCAN_TILES: usize = 256;
/// Highest carrier version tried during capacity search.
pub const DEFAULT_MAX_VERSION: u8 = 40;
/// Deepest recursion accepted for payload or overlay tiles.
pub const DEFAULT_MAX_DEPTH: u8 = 4;
/// Upper bound on a decompressed section blob.
pub const DEFAULT_DECOMPRESS_LIMIT: usize = 1024 * 1024;

/// Share of a tile covered when all eight depth-1 cells are painted.
const FULL_PAINT_COVERAGE: f64 = 8.0 / 9.0;

/// Errors produced while loading or validating a [`CodecConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse failed: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Paint colours for the different tile spans.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    /// Header and secret payload tiles.
    pub data: Rgb,
    /// Filler between header and secret.
    pub filler_lead: Rgb,
    /// Filler consuming leftover tiles at the end of the carrier.
    pub filler_tail: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            data: [255, 0, 0],
            filler_lead: [200, 0, 200],
            filler_tail: [0, 0, 255],
        }
    }
}

/// Shared encoder/decoder parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub filler_tile_count: usize,
    pub module_size: u32,
    pub module_size_candidates: Vec<u32>,
    pub dark_threshold: f64,
    pub bit_threshold: f64,
    pub header_scan_tiles: usize,
    pub max_version: u8,
    pub max_depth: u8,
    pub decompress_limit: usize,
    /// Base of the public payload URL; `?data=` is appended.
    pub public_base_url: String,
    pub palette: Palette,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            filler_tile_count: DEFAULT_FILLER_TILE_COUNT,
            module_size: DEFAULT_MODULE_SIZE,
            module_size_candidates: DEFAULT_MODULE_SIZE_CANDIDATES.to_vec(),
            dark_threshold: DEFAULT_DARK_THRESHOLD,
            bit_threshold: DEFAULT_BIT_THRESHOLD,
            header_scan_tiles: DEFAULT_HEADER_SCAN_TILES,
            max_version: DEFAULT_MAX_VERSION,
            max_depth: DEFAULT_MAX_DEPTH,
            decompress_limit: DEFAULT_DECOMPRESS_LIMIT,
            public_base_url: "https://example.org/scanner/l1.html".to_string(),
            palette: Palette::default(),
        }
    }
}

impl CodecConfig {
    /// Parse a TOML document and validate the result.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    ///
    /// Every palette colour must read as a set bit and must keep a fully
    /// painted tile below the dark threshold, otherwise painted tiles would
    /// drop out of the carrier scan order on decode.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.module_size < 3 {
            return Err(ConfigError::Invalid(format!(
                "module_size {} is smaller than one 3x3 split",
                self.module_size
            )));
        }
        if self.module_size_candidates.is_empty() {
            return Err(ConfigError::Invalid("module_size_candidates is empty".into()));
        }
        if let Some(bad) = self.module_size_candidates.iter().find(|&&m| m < 3) {
            return Err(ConfigError::Invalid(format!("module size candidate {bad} is below 3")));
        }
        if !(0.0..255.0).contains(&self.dark_threshold) || !(0.0..255.0).contains(&self.bit_threshold) {
            return Err(ConfigError::Invalid("thresholds must lie in [0, 255)".into()));
        }
        if self.max_version == 0 {
            return Err(ConfigError::Invalid("max_version must be at least 1".into()));
        }
        if self.max_depth == 0 || self.max_depth > crate::overlay::tile::MAX_TILE_DEPTH {
            return Err(ConfigError::Invalid(format!(
                "max_depth {} outside 1..={}",
                self.max_depth,
                crate::overlay::tile::MAX_TILE_DEPTH
            )));
        }
        if self.header_scan_tiles == 0 {
            return Err(ConfigError::Invalid("header_scan_tiles must be positive".into()));
        }
        for (name, color) in [
            ("data", self.palette.data),
            ("filler_lead", self.palette.filler_lead),
            ("filler_tail", self.palette.filler_tail),
        ] {
            let mean = (color[0] as f64 + color[1] as f64 + color[2] as f64) / 3.0;
            if mean <= self.bit_threshold {
                return Err(ConfigError::Invalid(format!(
                    "palette.{name} mean {mean:.1} does not exceed bit_threshold {}",
                    self.bit_threshold
                )));
            }
            let painted = luma(color[0], color[1], color[2]) as f64 * FULL_PAINT_COVERAGE;
            if painted >= self.dark_threshold {
                return Err(ConfigError::Invalid(format!(
                    "palette.{name} would lift a painted tile to luma {painted:.1}, above dark_threshold {}",
                    self.dark_threshold
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        CodecConfig::default().validate().unwrap();
    }

    #[test]
    fn toml_partial_override() {
        let cfg = CodecConfig::from_toml_str(
            r#"
            filler_tile_count = 6
            module_size_candidates = [27]

            [palette]
            data = [0, 0, 255]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.filler_tile_count, 6);
        assert_eq!(cfg.module_size_candidates, vec![27]);
        assert_eq!(cfg.palette.data, [0, 0, 255]);
        assert_eq!(cfg.palette.filler_lead, Palette::default().filler_lead);
        assert_eq!(cfg.module_size, DEFAULT_MODULE_SIZE);
    }

    #[test]
    fn bright_palette_rejected() {
        let mut cfg = CodecConfig::default();
        cfg.palette.data = [255, 255, 255];
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn dim_palette_rejected() {
        let mut cfg = CodecConfig::default();
        cfg.palette.filler_tail = [20, 20, 20];
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        assert!(matches!(
            CodecConfig::from_toml_str("module_size = \"big\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn zero_depth_rejected() {
        let cfg = CodecConfig { max_depth: 0, ..CodecConfig::default() };
        assert!(cfg.validate().is_err());
    }
}
