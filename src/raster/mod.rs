// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! RGBA canvas with region statistics and PNG container I/O.
//!
//! All tile painting and sampling happens on a [`Canvas`]: a single owned,
//! row-major RGBA8 buffer addressed by `(x, y, width, height)` rectangles.
//! Sub-regions are never copied out; callers pass origin and extent instead.
//!
//! PNG is the only container. Tile bits survive only lossless storage, so
//! no lossy format is offered.

pub mod error;

use std::io::Cursor;

use image::{ImageFormat, RgbaImage};

pub use error::{RasterError, Result};

/// An RGB colour triple.
pub type Rgb = [u8; 3];

/// Opaque black, the colour of an unpainted dark carrier module.
pub const BLACK: [u8; 4] = [0, 0, 0, 255];
/// Opaque white, the colour of a light carrier module.
pub const WHITE: [u8; 4] = [255, 255, 255, 255];
/// Fully transparent pixel used as the background of standalone tiles.
pub const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Rounded ITU-R 601-2 luma, the same integer transform used by common
/// imaging libraries when converting RGB to 8-bit grayscale.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 19_595 + g as u32 * 38_470 + b as u32 * 7_471 + 0x8000) >> 16) as u8
}

/// Owned RGBA8 pixel buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    /// Create a canvas filled with a single RGBA colour.
    pub fn new(width: u32, height: u32, fill: [u8; 4]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RasterError::Empty { width, height });
        }
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 4);
        for _ in 0..count {
            pixels.extend_from_slice(&fill);
        }
        Ok(Self { width, height, pixels })
    }

    /// Create a fully transparent canvas.
    pub fn transparent(width: u32, height: u32) -> Result<Self> {
        Self::new(width, height, TRANSPARENT)
    }

    /// Decode a PNG byte stream into an RGBA canvas.
    pub fn from_png(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .map_err(RasterError::Decode)?
            .to_rgba8();
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(RasterError::Empty { width, height });
        }
        Ok(Self { width, height, pixels: img.into_raw() })
    }

    /// Serialize the canvas as an RGBA PNG.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let img = RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or(RasterError::Empty { width: self.width, height: self.height })?;
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .map_err(RasterError::Encode)?;
        Ok(out)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// RGBA value at `(x, y)`. Panics when out of bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset(x, y);
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]]
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Verify that a rectangle lies entirely inside the canvas.
    pub fn check_region(&self, x: u32, y: u32, width: u32, height: u32) -> Result<()> {
        let fits_x = x.checked_add(width).map_or(false, |end| end <= self.width);
        let fits_y = y.checked_add(height).map_or(false, |end| end <= self.height);
        if fits_x && fits_y {
            Ok(())
        } else {
            Err(RasterError::OutOfBounds {
                x,
                y,
                width,
                height,
                canvas_width: self.width,
                canvas_height: self.height,
            })
        }
    }

    /// Fill a rectangle with an RGBA colour, clipped to the canvas.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, rgba: [u8; 4]) {
        let x_end = x.saturating_add(width).min(self.width);
        let y_end = y.saturating_add(height).min(self.height);
        for py in y.min(y_end)..y_end {
            let row_start = self.offset(x.min(x_end), py);
            let row_end = self.offset(x_end, py);
            for px in self.pixels[row_start..row_end].chunks_exact_mut(4) {
                px.copy_from_slice(&rgba);
            }
        }
    }

    /// Mean of all R, G and B samples in a rectangle (alpha ignored).
    ///
    /// Returns 0.0 for an empty rectangle. The rectangle must be in bounds.
    pub fn mean_rgb(&self, x: u32, y: u32, width: u32, height: u32) -> f64 {
        let count = width as u64 * height as u64 * 3;
        if count == 0 {
            return 0.0;
        }
        let mut sum = 0u64;
        for py in y..y + height {
            let start = self.offset(x, py);
            let end = self.offset(x + width, py);
            for px in self.pixels[start..end].chunks_exact(4) {
                sum += px[0] as u64 + px[1] as u64 + px[2] as u64;
            }
        }
        sum as f64 / count as f64
    }

    /// Mean grayscale luma of a rectangle (alpha ignored).
    pub fn mean_luma(&self, x: u32, y: u32, width: u32, height: u32) -> f64 {
        let count = width as u64 * height as u64;
        if count == 0 {
            return 0.0;
        }
        let mut sum = 0u64;
        for py in y..y + height {
            let start = self.offset(x, py);
            let end = self.offset(x + width, py);
            for px in self.pixels[start..end].chunks_exact(4) {
                sum += luma(px[0], px[1], px[2]) as u64;
            }
        }
        sum as f64 / count as f64
    }
}
