// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Layered fractal-tile codec.
//!
//! Hidden layers ride on the dark modules of a public barcode:
//!
//! - **Tiles** (`tile`): one dark module carries `8^depth` bits as a
//!   recursive 3x3 pattern of painted cells.
//! - **Carrier** (`carrier`): dark modules are found from pixels and
//!   numbered in row-major order; the barcode version is chosen by capacity.
//! - **Composer** (`compose`): header, filler, secret payload and overlay
//!   reservation are laid out over the numbered tiles.
//! - **Sections** (`sections`): named blobs are framed and zlib-compressed
//!   into the payload, and recovered with prefix-tolerant resync.
//!
//! [`issue`], [`append_overlay`] and [`decode_layers`] tie these together.

pub mod error;
pub mod bits;
pub mod tile;
pub mod carrier;
pub mod capacity;
pub mod header;
pub mod filler;
pub mod sections;
pub mod compose;
mod pipeline;

pub use error::OverlayError;
pub use carrier::{CarrierMatrix, ErrorCorrection, MatrixError, MatrixGenerator, MatrixReader, TilePos};
pub use compose::{DecodedLayout, LayoutPlan, OverlayHit};
pub use header::Header;
pub use pipeline::{append_overlay, decode_layers, issue, read_header, DecodedImage, IssueOptions, Issued};
pub use sections::{BlobFormat, Resync, SectionRegistry, Serializable};

use crate::config::CodecConfig;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Decode several independent images. Results are in input order.
///
/// With the `parallel` feature the images are decoded on rayon workers.
pub fn decode_many<T, P>(
    pngs: &[P],
    registry: &SectionRegistry<T>,
    overlay_registry: Option<&SectionRegistry<T>>,
    config: &CodecConfig,
) -> Vec<Result<DecodedImage<T>, OverlayError>>
where
    T: Send,
    P: AsRef<[u8]> + Sync,
{
    let decode_one = |png: &P| decode_layers(png.as_ref(), registry, overlay_registry, config);

    #[cfg(feature = "parallel")]
    let results = pngs.par_iter().map(decode_one).collect();
    #[cfg(not(feature = "parallel"))]
    let results = pngs.iter().map(decode_one).collect();

    results
}
