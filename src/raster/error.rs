// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Error types for canvas access and PNG container I/O.

use thiserror::Error;

/// Errors that can occur while reading, writing, or addressing a canvas.
#[derive(Debug, Error)]
pub enum RasterError {
    /// The input bytes could not be decoded as a PNG image.
    #[error("PNG decode failed: {0}")]
    Decode(#[source] image::ImageError),
    /// The canvas could not be serialized to PNG.
    #[error("PNG encode failed: {0}")]
    Encode(#[source] image::ImageError),
    /// Width or height is zero.
    #[error("canvas dimensions must be non-zero (got {width}x{height})")]
    Empty { width: u32, height: u32 },
    /// A rectangular region reaches outside the canvas.
    #[error("region at ({x},{y}) size {width}x{height} exceeds {canvas_width}x{canvas_height} canvas")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        canvas_width: u32,
        canvas_height: u32,
    },
}

pub type Result<T> = std::result::Result<T, RasterError>;
