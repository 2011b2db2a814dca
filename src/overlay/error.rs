// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Error types for the layered tile codec.
//!
//! [`OverlayError`] covers all failure modes from tile geometry through
//! carrier selection, header recovery and section framing. Every variant
//! carries the counts or offsets needed to diagnose the failing image.

use thiserror::Error;

use crate::config::ConfigError;
use crate::raster::RasterError;

/// Errors that can occur while composing or decoding a layered image.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// A tile was handed the wrong number of bytes for its depth.
    #[error("depth {depth} tile takes {expected} bytes, got {actual}")]
    ArityMismatch { depth: u8, expected: usize, actual: usize },
    /// The tile region cannot hold the requested depth, or lies off-canvas.
    #[error("invalid tile geometry: {0}")]
    TileGeometry(String),
    /// No carrier version up to the limit has enough dark tiles.
    #[error("no carrier up to version {max_version} holds {required_tiles} tiles (best had {best_available})")]
    NoCapacity { required_tiles: usize, max_version: u8, best_available: usize },
    /// The image ran out of dark tiles before a span was fully read or painted.
    #[error("carrier exhausted: need {needed} dark tiles, image has {available}")]
    CarrierExhausted { needed: usize, available: usize },
    /// No balanced `{...}` record was found, or its JSON is invalid.
    #[error("header parse failed: {reason}")]
    HeaderParseError { reason: String },
    /// The section blob could not be decompressed or its records are cut short.
    #[error("section framing error at byte {offset}: {reason}")]
    FramingError { offset: usize, reason: String },
    /// A record names a section without a registered parser.
    #[error("unknown section {name:?}")]
    UnknownSection { name: String },
    /// The overlay does not fit the space reserved at issuance.
    #[error("overlay needs {needed} bits but only {reserved} were reserved")]
    InsufficientReservedBits { needed: usize, reserved: usize },
    /// The overlay depth exceeds what the header allows.
    #[error("overlay depth {requested} exceeds the allowed maximum {allowed}")]
    OverlayDepthNotAllowed { requested: u8, allowed: u8 },
    /// A section cannot be framed (bad name or oversized content) or parsed.
    #[error("invalid section {name:?}: {reason}")]
    InvalidSection { name: String, reason: String },
    /// The external matrix generator failed for a reason other than capacity.
    #[error("carrier matrix: {0}")]
    Matrix(String),
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, OverlayError>;
