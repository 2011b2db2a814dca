// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Bitstream layout across carrier tiles.
//!
//! Tiles are consumed in [`enumerate_dark_tiles`] order:
//!
//! ```text
//! [header d1][lead filler d1][secret d][reservation, blank][tail filler d1]
//!  ^0         ^header_tiles   ^secret_start ^overlay_start  ^tail_start
//! ```
//!
//! The header is the only span with a fixed position. Every other offset
//! follows from header fields, so the decoder rebuilds the [`LayoutPlan`]
//! from the header alone. The reservation is sized for `reserve_bits` at
//! depth 1, which is the most tiles any allowed overlay depth can need.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::config::{CodecConfig, Palette};
use crate::overlay::bits::truncate_bits;
use crate::overlay::capacity::tiles_for_bits;
use crate::overlay::carrier::{enumerate_dark_tiles, TilePos};
use crate::overlay::error::{OverlayError, Result};
use crate::overlay::filler::FillerSource;
use crate::overlay::header::{scan_header, Header};
use crate::overlay::sections::{decode_sections, Resync, SectionRegistry};
use crate::overlay::tile::{bytes_per_tile, decode_tile, paint_tile, MAX_TILE_DEPTH};
use crate::raster::{Canvas, Rgb};

/// Tile spans of one image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutPlan {
    pub header_tiles: usize,
    pub filler_tiles: usize,
    pub secret_depth: u8,
    pub secret_bits: usize,
    pub secret_tiles: usize,
    pub reserve_bits: usize,
    pub reserved_tiles: usize,
}

impl LayoutPlan {
    /// Rebuild the plan from a parsed header spanning `header_tiles` tiles.
    pub fn from_header(header: &Header, header_tiles: usize, default_filler_bits: usize) -> Self {
        let reserve_bits = header.reserve_bits();
        Self {
            header_tiles,
            filler_tiles: header.filler_bits_or(default_filler_bits).div_ceil(8),
            secret_depth: header.depth,
            secret_bits: header.bit_length,
            secret_tiles: header.bit_length.div_ceil(header.secret_bits_per_tile()),
            reserve_bits,
            reserved_tiles: tiles_for_bits(reserve_bits, 1),
        }
    }

    pub fn filler_start(&self) -> usize {
        self.header_tiles
    }

    pub fn secret_start(&self) -> usize {
        self.header_tiles + self.filler_tiles
    }

    pub fn overlay_start(&self) -> usize {
        self.secret_start() + self.secret_tiles
    }

    pub fn tail_start(&self) -> usize {
        self.overlay_start() + self.reserved_tiles
    }

    /// Tiles needed before any tail filler.
    pub fn required_tiles(&self) -> usize {
        self.tail_start()
    }
}

/// Inputs for [`compose`].
#[derive(Clone, Debug)]
pub struct ComposeParams {
    pub depth: u8,
    pub module_size: u32,
    pub filler_tile_count: usize,
    pub reserve_bits: usize,
    pub asserter_max_depth: Option<u8>,
}

/// Everything that gets painted, before a carrier is chosen.
#[derive(Clone, Debug)]
pub struct ComposedStream {
    pub header: Header,
    pub header_bytes: Vec<u8>,
    pub lead_filler: Vec<u8>,
    pub secret: Vec<u8>,
    pub plan: LayoutPlan,
}

/// Build the header, the lead filler and the layout for `secret`.
pub fn compose(secret: &[u8], params: &ComposeParams, filler: &mut FillerSource) -> Result<ComposedStream> {
    if params.depth == 0 || params.depth > MAX_TILE_DEPTH {
        return Err(OverlayError::TileGeometry(format!(
            "secret depth {} outside 1..={MAX_TILE_DEPTH}",
            params.depth
        )));
    }
    if let Some(d) = params.asserter_max_depth {
        if d == 0 || d > MAX_TILE_DEPTH {
            return Err(OverlayError::OverlayDepthNotAllowed { requested: d, allowed: MAX_TILE_DEPTH });
        }
    }

    let filler_bits = params.filler_tile_count * 8;
    let header = Header::new(params.depth, secret.len() * 8, filler_bits, params.module_size)
        .with_reservation(params.reserve_bits, params.asserter_max_depth);
    let header_bytes = header.to_bytes()?;
    let plan = LayoutPlan::from_header(&header, header_bytes.len(), filler_bits);
    debug!(
        header_tiles = plan.header_tiles,
        filler_tiles = plan.filler_tiles,
        secret_tiles = plan.secret_tiles,
        reserved_tiles = plan.reserved_tiles,
        "layout planned"
    );

    Ok(ComposedStream {
        lead_filler: filler.next_bytes(params.filler_tile_count),
        header,
        header_bytes,
        secret: secret.to_vec(),
        plan,
    })
}

/// Paint `bytes` at `depth` over consecutive `tiles`, one tile-sized chunk
/// each; the last chunk is zero-padded. Returns the number of tiles used.
pub fn paint_span(
    canvas: &mut Canvas,
    tiles: &[TilePos],
    module_size: u32,
    bytes: &[u8],
    depth: u8,
    color: Rgb,
) -> Result<usize> {
    let per_tile = bytes_per_tile(depth);
    let needed = bytes.len().div_ceil(per_tile);
    if needed > tiles.len() {
        return Err(OverlayError::CarrierExhausted { needed, available: tiles.len() });
    }
    let mut chunk = vec![0u8; per_tile];
    for (pos, src) in tiles.iter().zip(bytes.chunks(per_tile)) {
        chunk.fill(0);
        chunk[..src.len()].copy_from_slice(src);
        let (x, y) = pos.origin(module_size);
        paint_tile(canvas, x, y, module_size, &chunk, depth, color)?;
    }
    Ok(needed)
}

/// Paint a composed stream onto a rendered carrier.
///
/// `tiles` must come from [`enumerate_dark_tiles`] on the unpainted carrier.
/// Every tile past the reservation gets tail filler.
pub fn render_stream(
    canvas: &mut Canvas,
    tiles: &[TilePos],
    module_size: u32,
    stream: &ComposedStream,
    palette: &Palette,
    filler: &mut FillerSource,
) -> Result<()> {
    let plan = &stream.plan;
    if tiles.len() < plan.required_tiles() {
        return Err(OverlayError::CarrierExhausted { needed: plan.required_tiles(), available: tiles.len() });
    }

    paint_span(canvas, tiles, module_size, &stream.header_bytes, 1, palette.data)?;
    paint_span(canvas, &tiles[plan.filler_start()..], module_size, &stream.lead_filler, 1, palette.filler_lead)?;
    paint_span(
        canvas,
        &tiles[plan.secret_start()..],
        module_size,
        &stream.secret,
        plan.secret_depth,
        palette.data,
    )?;

    let tail = &tiles[plan.tail_start()..];
    let tail_bytes = filler.next_bytes(tail.len());
    paint_span(canvas, tail, module_size, &tail_bytes, 1, palette.filler_tail)?;
    debug!(tail_tiles = tail.len(), "stream rendered");
    Ok(())
}

/// Decode `count` tiles at `depth` starting at tile index `start`.
pub fn read_span(
    canvas: &Canvas,
    tiles: &[TilePos],
    module_size: u32,
    start: usize,
    count: usize,
    depth: u8,
    threshold: f64,
) -> Result<Vec<u8>> {
    let end = start + count;
    if end > tiles.len() {
        return Err(OverlayError::CarrierExhausted { needed: end, available: tiles.len() });
    }
    let mut out = Vec::with_capacity(count * bytes_per_tile(depth));
    for pos in &tiles[start..end] {
        let (x, y) = pos.origin(module_size);
        out.extend(decode_tile(canvas, x, y, module_size, depth, threshold)?);
    }
    Ok(out)
}

/// Layout recovered from an image.
#[derive(Clone, Debug)]
pub struct DecodedLayout {
    pub header: Header,
    pub module_size: u32,
    pub tiles: Vec<TilePos>,
    pub plan: LayoutPlan,
}

/// Find the header by probing each configured module size.
///
/// A candidate is accepted only when the header parses and its own
/// `module_size` (if present) matches the candidate.
pub fn locate_header(canvas: &Canvas, config: &CodecConfig) -> Result<DecodedLayout> {
    let mut last_error = None;

    for &module_size in &config.module_size_candidates {
        let tiles = enumerate_dark_tiles(canvas, module_size, config.dark_threshold);
        if tiles.is_empty() {
            debug!(module_size, "no dark tiles at this module size");
            continue;
        }
        let window = config.header_scan_tiles.min(tiles.len());
        let parsed = read_span(canvas, &tiles, module_size, 0, window, 1, config.bit_threshold)
            .and_then(|bytes| scan_header(&bytes));
        match parsed {
            Ok((header, header_tiles)) => {
                if let Some(declared) = header.module_size {
                    if declared != module_size {
                        warn!(probed = module_size, declared, "header module size disagrees with grid, skipping");
                        continue;
                    }
                }
                let plan = LayoutPlan::from_header(&header, header_tiles, config.filler_tile_count * 8);
                debug!(module_size, header_tiles, secret_start = plan.secret_start(), "header located");
                return Ok(DecodedLayout { header, module_size, tiles, plan });
            }
            Err(e) => {
                debug!(module_size, error = %e, "no header at this module size");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| OverlayError::HeaderParseError {
        reason: "no module size candidate produced a header".into(),
    }))
}

/// Read the secret blob, trimmed to the header's `bit_length`.
pub fn extract_secret(canvas: &Canvas, layout: &DecodedLayout, threshold: f64) -> Result<Vec<u8>> {
    let plan = &layout.plan;
    let bytes = read_span(
        canvas,
        &layout.tiles,
        layout.module_size,
        plan.secret_start(),
        plan.secret_tiles,
        plan.secret_depth,
        threshold,
    )?;
    Ok(truncate_bits(&bytes, plan.secret_bits))
}

/// An overlay found by [`extract_overlay`].
#[derive(Debug)]
pub struct OverlayHit<T> {
    pub depth: u8,
    pub sections: BTreeMap<String, T>,
    pub resync: Resync,
}

/// Probe the reservation for an overlay, deepest allowed depth first.
///
/// The first depth whose bits decode to at least one registered section
/// wins. Failures at a depth are expected and only logged.
pub fn extract_overlay<T>(
    canvas: &Canvas,
    layout: &DecodedLayout,
    registry: &SectionRegistry<T>,
    config: &CodecConfig,
) -> Option<OverlayHit<T>> {
    let reserve_bits = layout.plan.reserve_bits;
    if reserve_bits == 0 {
        return None;
    }
    for depth in (1..=layout.header.overlay_max_depth()).rev() {
        let probe = read_span(
            canvas,
            &layout.tiles,
            layout.module_size,
            layout.plan.overlay_start(),
            tiles_for_bits(reserve_bits, depth),
            depth,
            config.bit_threshold,
        )
        .and_then(|bytes| decode_sections(&truncate_bits(&bytes, reserve_bits), registry, config.decompress_limit));
        match probe {
            Ok(decoded) if !decoded.sections.is_empty() => {
                debug!(depth, "overlay found");
                return Some(OverlayHit { depth, sections: decoded.sections, resync: decoded.resync });
            }
            Ok(_) => debug!(depth, "overlay probe decoded no sections"),
            Err(e) => debug!(depth, error = %e, "overlay probe failed"),
        }
    }
    None
}

/// Paint an overlay blob into the reservation of an issued image.
///
/// All checks run before the first pixel changes.
pub fn append_overlay_blob(
    canvas: &mut Canvas,
    layout: &DecodedLayout,
    blob: &[u8],
    depth: u8,
    color: Rgb,
) -> Result<usize> {
    let allowed = layout.header.overlay_max_depth();
    if depth == 0 || depth > allowed {
        return Err(OverlayError::OverlayDepthNotAllowed { requested: depth, allowed });
    }
    let needed_bits = blob.len() * 8;
    let reserved = layout.plan.reserve_bits;
    if reserved == 0 || needed_bits > reserved {
        return Err(OverlayError::InsufficientReservedBits { needed: needed_bits, reserved });
    }
    let start = layout.plan.overlay_start();
    let needed = start + tiles_for_bits(needed_bits, depth);
    if needed > layout.tiles.len() {
        return Err(OverlayError::CarrierExhausted { needed, available: layout.tiles.len() });
    }

    let used = paint_span(canvas, &layout.tiles[start..], layout.module_size, blob, depth, color)?;
    info!(depth, tiles = used, bits = needed_bits, "overlay appended");
    Ok(used)
}
