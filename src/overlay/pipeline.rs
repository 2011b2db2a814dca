// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Issue, append and decode pipelines.
//!
//! Issue flow:
//! 1. Multiplex and compress the sections into the secret blob
//! 2. Build the header, lead filler and layout plan
//! 3. Pick the smallest carrier version that holds the plan
//! 4. Render the carrier, enumerate its dark tiles, paint the stream
//!
//! Decode flow:
//! 1. Probe module sizes until a header parses
//! 2. Rebuild the layout plan from the header
//! 3. Read and decompress the secret span
//! 4. Probe the reservation for an overlay, deepest depth first

use std::collections::BTreeMap;

use tracing::info;

use crate::config::CodecConfig;
use crate::overlay::capacity::{module_size_for_depth, secret_capacity_bits};
use crate::overlay::carrier::{enumerate_dark_tiles, render_carrier, select_carrier, MatrixGenerator};
use crate::overlay::compose::{
    append_overlay_blob, compose, extract_overlay, extract_secret, locate_header, render_stream, ComposeParams,
    DecodedLayout, LayoutPlan, OverlayHit,
};
use crate::overlay::error::{OverlayError, Result};
use crate::overlay::filler::FillerSource;
use crate::overlay::header::Header;
use crate::overlay::sections::{decode_sections, encode_sections, BlobFormat, Resync, SectionRegistry, Serializable};
use crate::raster::Canvas;

/// Options for [`issue`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssueOptions {
    /// Recursion depth of the secret payload tiles.
    pub depth: u8,
    /// Bits left blank for a later overlay; 0 disables overlays.
    pub reserve_bits: usize,
    /// Deepest depth a later overlay may use.
    pub asserter_max_depth: Option<u8>,
    /// Seed for filler bytes. `None` draws from the OS.
    pub filler_seed: Option<u64>,
    pub blob_format: BlobFormat,
}

impl Default for IssueOptions {
    fn default() -> Self {
        Self { depth: 1, reserve_bits: 0, asserter_max_depth: None, filler_seed: None, blob_format: BlobFormat::Bare }
    }
}

/// A freshly issued image.
#[derive(Clone, Debug)]
pub struct Issued {
    pub png: Vec<u8>,
    pub header: Header,
    pub plan: LayoutPlan,
    pub version: u8,
    pub module_size: u32,
    /// The compressed blob painted as the secret payload.
    pub secret_blob: Vec<u8>,
}

/// Everything recovered from one image.
#[derive(Debug)]
pub struct DecodedImage<T> {
    pub header: Header,
    pub module_size: u32,
    pub plan: LayoutPlan,
    pub sections: BTreeMap<String, T>,
    pub resync: Resync,
    pub overlay: Option<OverlayHit<T>>,
}

/// Issue a layered image carrying `sections` under the public barcode for
/// `public_payload`.
pub fn issue<G, I, N, S>(
    generator: &G,
    public_payload: &str,
    sections: I,
    options: &IssueOptions,
    config: &CodecConfig,
) -> Result<Issued>
where
    G: MatrixGenerator + ?Sized,
    I: IntoIterator<Item = (N, S)>,
    N: AsRef<str>,
    S: Serializable,
{
    config.validate()?;
    if options.depth == 0 || options.depth > config.max_depth {
        return Err(OverlayError::TileGeometry(format!(
            "secret depth {} outside 1..={}",
            options.depth, config.max_depth
        )));
    }
    if let Some(d) = options.asserter_max_depth {
        if d == 0 || d > config.max_depth {
            return Err(OverlayError::OverlayDepthNotAllowed { requested: d, allowed: config.max_depth });
        }
    }

    let secret_blob = encode_sections(sections, options.blob_format)?;
    let deepest = options.depth.max(options.asserter_max_depth.unwrap_or(1));
    let module_size = module_size_for_depth(deepest, config.module_size);
    if !config.module_size_candidates.contains(&module_size) {
        return Err(OverlayError::TileGeometry(format!(
            "depth {deepest} needs {module_size}px modules, which decoders do not probe"
        )));
    }
    let mut filler = match options.filler_seed {
        Some(seed) => FillerSource::seeded(seed),
        None => FillerSource::from_entropy(),
    };

    let params = ComposeParams {
        depth: options.depth,
        module_size,
        filler_tile_count: config.filler_tile_count,
        reserve_bits: options.reserve_bits,
        asserter_max_depth: options.asserter_max_depth,
    };
    let stream = compose(&secret_blob, &params, &mut filler)?;
    let plan = stream.plan;

    let selected = select_carrier(generator, plan.required_tiles() * 8, public_payload, 8, config.max_version)?;
    let mut canvas = render_carrier(&selected.matrix, module_size)?;
    let tiles = enumerate_dark_tiles(&canvas, module_size, config.dark_threshold);
    render_stream(&mut canvas, &tiles, module_size, &stream, &config.palette, &mut filler)?;
    let png = canvas.to_png()?;

    let capacity_bits = secret_capacity_bits(
        tiles.len(),
        plan.header_tiles,
        plan.filler_tiles,
        plan.reserved_tiles,
        plan.secret_depth,
    );
    info!(
        version = selected.version,
        module_size,
        secret_bits = plan.secret_bits,
        capacity_bits,
        "image issued"
    );

    Ok(Issued { png, header: stream.header, plan, version: selected.version, module_size, secret_blob })
}

/// Read only the header and layout of an image.
pub fn read_header(png: &[u8], config: &CodecConfig) -> Result<DecodedLayout> {
    let canvas = Canvas::from_png(png)?;
    locate_header(&canvas, config)
}

/// Paint an overlay made of `sections` at `depth` into the reservation of an
/// issued image and return the new PNG.
pub fn append_overlay<I, N, S>(
    png: &[u8],
    sections: I,
    depth: u8,
    format: BlobFormat,
    config: &CodecConfig,
) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (N, S)>,
    N: AsRef<str>,
    S: Serializable,
{
    let mut canvas = Canvas::from_png(png)?;
    let layout = locate_header(&canvas, config)?;
    let blob = encode_sections(sections, format)?;
    append_overlay_blob(&mut canvas, &layout, &blob, depth, config.palette.data)?;
    Ok(canvas.to_png()?)
}

/// Decode the secret sections and, when `overlay_registry` is given, the
/// overlay of an image.
pub fn decode_layers<T>(
    png: &[u8],
    registry: &SectionRegistry<T>,
    overlay_registry: Option<&SectionRegistry<T>>,
    config: &CodecConfig,
) -> Result<DecodedImage<T>> {
    let canvas = Canvas::from_png(png)?;
    let layout = locate_header(&canvas, config)?;
    let secret = extract_secret(&canvas, &layout, config.bit_threshold)?;
    let decoded = decode_sections(&secret, registry, config.decompress_limit)?;
    let overlay = overlay_registry.and_then(|reg| extract_overlay(&canvas, &layout, reg, config));

    Ok(DecodedImage {
        header: layout.header,
        module_size: layout.module_size,
        plan: layout.plan,
        sections: decoded.sections,
        resync: decoded.resync,
        overlay,
    })
}
