// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Section multiplexing, compression and tolerant decompression.
//!
//! Named sections are framed back to back and the whole run is
//! zlib-compressed:
//!
//! ```text
//! [1 byte ] name_len (1-255)
//! [N bytes] name (ASCII)
//! [2 bytes] content_len (u16 BE)
//! [M bytes] content
//! ```
//!
//! Two blob variants exist on the wire:
//!
//! ```text
//! bare:      [zlib stream]
//! with meta: [1 byte json_len][{"depth":..,"bit_length":..}][zlib stream]
//! ```
//!
//! Decoding tries the bare form, then the meta form, then every offset where
//! a zlib header (`0x78` followed by `0x01`, `0x5E`, `0x9C` or `0xDA`)
//! appears. The last step recovers blobs behind unknown leading bytes, such
//! as the 2-byte bit count some older encoders wrote, or a few garbage bytes
//! from a misaligned read. A candidate only counts when its stream ends
//! cleanly with a valid checksum; trailing bytes after the stream are
//! ignored, since tile padding always follows the blob.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::overlay::error::{OverlayError, Result};

/// Longest section name.
pub const MAX_NAME_LEN: usize = 255;
/// Largest section content.
pub const MAX_CONTENT_LEN: usize = u16::MAX as usize;
/// Second byte of the zlib headers the resync scan accepts after `0x78`.
pub const ZLIB_MAGIC_SECOND: [u8; 4] = [0x01, 0x5E, 0x9C, 0xDA];

/// A section value that can be written into a record.
pub trait Serializable {
    fn to_bytes(&self) -> Vec<u8>;
}

impl Serializable for [u8] {
    fn to_bytes(&self) -> Vec<u8> {
        self.to_vec()
    }
}

impl Serializable for Vec<u8> {
    fn to_bytes(&self) -> Vec<u8> {
        self.clone()
    }
}

impl<T: Serializable + ?Sized> Serializable for &T {
    fn to_bytes(&self) -> Vec<u8> {
        (**self).to_bytes()
    }
}

impl<T: Serializable + ?Sized> Serializable for Box<T> {
    fn to_bytes(&self) -> Vec<u8> {
        (**self).to_bytes()
    }
}

type SectionParser<T> = Box<dyn Fn(&[u8]) -> Result<T> + Send + Sync>;

/// Maps section names to parsers. Decoding fails on any record whose name
/// is not registered.
pub struct SectionRegistry<T> {
    parsers: BTreeMap<String, SectionParser<T>>,
}

impl<T> SectionRegistry<T> {
    pub fn new() -> Self {
        Self { parsers: BTreeMap::new() }
    }

    /// Register `parser` for `name`, replacing any earlier one.
    pub fn register<F>(&mut self, name: impl Into<String>, parser: F) -> &mut Self
    where
        F: Fn(&[u8]) -> Result<T> + Send + Sync + 'static,
    {
        self.parsers.insert(name.into(), Box::new(parser));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parsers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parsers.keys().map(String::as_str)
    }

    fn parser(&self, name: &str) -> Result<&SectionParser<T>> {
        self.parsers
            .get(name)
            .ok_or_else(|| OverlayError::UnknownSection { name: name.to_string() })
    }
}

impl<T> Default for SectionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionRegistry<Vec<u8>> {
    /// Registry that returns the raw content of each named section.
    pub fn raw<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for name in names {
            registry.register(name, |bytes: &[u8]| Ok(bytes.to_vec()));
        }
        registry
    }
}

/// Blob wire variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlobFormat {
    Bare,
    /// Prefix the stream with a micro-header naming the tile depth.
    WithMeta { depth: u8 },
}

/// Metadata record of the [`BlobFormat::WithMeta`] variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicroHeader {
    pub depth: u8,
    /// Bit count of the compressed stream that follows.
    pub bit_length: usize,
}

/// How a blob was interpreted on decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resync {
    Direct,
    MicroHeader(MicroHeader),
    /// Stream found by magic scan at this byte offset.
    Magic { offset: usize },
}

/// Sections recovered from a blob.
#[derive(Debug)]
pub struct DecodedSections<T> {
    pub sections: BTreeMap<String, T>,
    pub resync: Resync,
}

/// Frame sections into the uncompressed record run.
pub fn frame_records<I, N, S>(sections: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (N, S)>,
    N: AsRef<str>,
    S: Serializable,
{
    let mut buf = Vec::new();
    for (name, section) in sections {
        let name = name.as_ref();
        if name.is_empty() || name.len() > MAX_NAME_LEN || !name.is_ascii() {
            return Err(OverlayError::InvalidSection {
                name: name.to_string(),
                reason: format!("name must be 1-{MAX_NAME_LEN} ASCII bytes"),
            });
        }
        let content = section.to_bytes();
        if content.len() > MAX_CONTENT_LEN {
            return Err(OverlayError::InvalidSection {
                name: name.to_string(),
                reason: format!("{} bytes exceeds {MAX_CONTENT_LEN}", content.len()),
            });
        }
        buf.push(name.len() as u8);
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(&(content.len() as u16).to_be_bytes());
        buf.extend_from_slice(&content);
    }
    Ok(buf)
}

/// Frame, compress and wrap sections into a blob.
pub fn encode_sections<I, N, S>(sections: I, format: BlobFormat) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (N, S)>,
    N: AsRef<str>,
    S: Serializable,
{
    let framed = frame_records(sections)?;
    let compressed = deflate(&framed)?;
    match format {
        BlobFormat::Bare => Ok(compressed),
        BlobFormat::WithMeta { depth } => {
            let meta = MicroHeader { depth, bit_length: compressed.len() * 8 };
            let meta_json = serde_json::to_vec(&meta).map_err(|e| OverlayError::FramingError {
                offset: 0,
                reason: format!("micro-header serialization failed: {e}"),
            })?;
            let mut blob = Vec::with_capacity(1 + meta_json.len() + compressed.len());
            // A u8 depth and usize length always fit in 255 bytes of JSON.
            blob.push(meta_json.len() as u8);
            blob.extend_from_slice(&meta_json);
            blob.extend_from_slice(&compressed);
            Ok(blob)
        }
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| OverlayError::FramingError { offset: 0, reason: format!("compression failed: {e}") })
}

/// Inflate one complete zlib stream from the start of `data`.
///
/// Fails unless the stream ends within `data`, and when the output would
/// exceed `limit` bytes.
fn inflate_stream(data: &[u8], limit: usize) -> std::result::Result<Vec<u8>, String> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    (&mut decoder)
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| e.to_string())?;
    if out.len() > limit {
        return Err(format!("inflated size exceeds {limit} bytes"));
    }
    // The reader stops quietly when input runs out mid-stream; a stream that
    // reached its end has the adler32 of the output as its last 4 bytes.
    let consumed = decoder.total_in() as usize;
    if consumed < ZLIB_MIN_STREAM || data[consumed - 4..consumed] != adler32(&out).to_be_bytes() {
        return Err("zlib stream is truncated".into());
    }
    Ok(out)
}

/// Smallest complete zlib stream: 2-byte header, empty block, checksum.
const ZLIB_MIN_STREAM: usize = 8;

fn adler32(data: &[u8]) -> u32 {
    const MOD: u32 = 65_521;
    // Largest run before `b` can overflow u32.
    const NMAX: usize = 5_552;
    let (mut a, mut b) = (1u32, 0u32);
    for chunk in data.chunks(NMAX) {
        for &byte in chunk {
            a += byte as u32;
            b += a;
        }
        a %= MOD;
        b %= MOD;
    }
    (b << 16) | a
}

fn split_micro_header(blob: &[u8]) -> Option<(MicroHeader, &[u8])> {
    let len = *blob.first()? as usize;
    if len == 0 || blob.len() < 1 + len {
        return None;
    }
    let meta = serde_json::from_slice(&blob[1..1 + len]).ok()?;
    Some((meta, &blob[1 + len..]))
}

fn magic_offsets(blob: &[u8]) -> impl Iterator<Item = usize> + '_ {
    blob.windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] == 0x78 && ZLIB_MAGIC_SECOND.contains(&w[1]))
        .map(|(i, _)| i)
}

/// Decompress a blob under each resync strategy in turn.
pub fn inflate_blob(blob: &[u8], limit: usize) -> Result<(Vec<u8>, Resync)> {
    let mut last_reason = match inflate_stream(blob, limit) {
        Ok(out) => return Ok((out, Resync::Direct)),
        Err(reason) => reason,
    };

    if let Some((meta, rest)) = split_micro_header(blob) {
        match inflate_stream(rest, limit) {
            Ok(out) => {
                debug!(depth = meta.depth, bit_length = meta.bit_length, "section blob carries micro-header");
                return Ok((out, Resync::MicroHeader(meta)));
            }
            Err(reason) => last_reason = reason,
        }
    }

    for offset in magic_offsets(blob).filter(|&o| o > 0) {
        match inflate_stream(&blob[offset..], limit) {
            Ok(out) => {
                warn!(offset, "section blob resynchronised on zlib magic");
                return Ok((out, Resync::Magic { offset }));
            }
            Err(reason) => {
                debug!(offset, %reason, "zlib magic candidate rejected");
                last_reason = reason;
            }
        }
    }

    Err(OverlayError::FramingError {
        offset: 0,
        reason: format!("no decodable zlib stream in {} bytes ({last_reason})", blob.len()),
    })
}

/// Walk an uncompressed record run, parsing each section with `registry`.
///
/// A later record with the same name replaces an earlier one.
pub fn parse_records<T>(data: &[u8], registry: &SectionRegistry<T>) -> Result<BTreeMap<String, T>> {
    let mut sections = BTreeMap::new();
    let mut cursor = 0;

    while cursor < data.len() {
        let record_start = cursor;
        let name_len = data[cursor] as usize;
        cursor += 1;
        if name_len == 0 || cursor + name_len > data.len() {
            return Err(OverlayError::FramingError {
                offset: record_start,
                reason: format!("section name of {name_len} bytes does not fit"),
            });
        }
        let name = String::from_utf8_lossy(&data[cursor..cursor + name_len]).into_owned();
        let parser = registry.parser(&name)?;
        cursor += name_len;

        if cursor + 2 > data.len() {
            return Err(OverlayError::FramingError {
                offset: cursor,
                reason: format!("length of section {name:?} is cut short"),
            });
        }
        let content_len = u16::from_be_bytes([data[cursor], data[cursor + 1]]) as usize;
        cursor += 2;
        if cursor + content_len > data.len() {
            return Err(OverlayError::FramingError {
                offset: cursor,
                reason: format!(
                    "section {name:?} declares {content_len} bytes, {} remain",
                    data.len() - cursor
                ),
            });
        }
        let value = parser(&data[cursor..cursor + content_len])?;
        cursor += content_len;
        sections.insert(name, value);
    }

    Ok(sections)
}

/// Decompress a blob and parse its sections.
pub fn decode_sections<T>(blob: &[u8], registry: &SectionRegistry<T>, limit: usize) -> Result<DecodedSections<T>> {
    let (records, resync) = inflate_blob(blob, limit)?;
    let sections = parse_records(&records, registry)?;
    Ok(DecodedSections { sections, resync })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 1 << 20;

    fn vip_staff() -> BTreeMap<String, Vec<u8>> {
        BTreeMap::from([("VIP".to_string(), b"abc".to_vec()), ("STAFF".to_string(), b"xyz".to_vec())])
    }

    fn registry() -> SectionRegistry<Vec<u8>> {
        SectionRegistry::raw(["VIP", "STAFF"])
    }

    #[test]
    fn record_layout() {
        let framed = frame_records([("VIP", b"abc".to_vec())]).unwrap();
        assert_eq!(framed, [3, b'V', b'I', b'P', 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn bare_roundtrip_is_direct() {
        let blob = encode_sections(&vip_staff(), BlobFormat::Bare).unwrap();
        assert_eq!(blob[0], 0x78);
        let decoded = decode_sections(&blob, &registry(), LIMIT).unwrap();
        assert_eq!(decoded.sections, vip_staff());
        assert_eq!(decoded.resync, Resync::Direct);
    }

    #[test]
    fn micro_header_variant() {
        let bare = encode_sections(&vip_staff(), BlobFormat::Bare).unwrap();
        let blob = encode_sections(&vip_staff(), BlobFormat::WithMeta { depth: 2 }).unwrap();
        let decoded = decode_sections(&blob, &registry(), LIMIT).unwrap();
        assert_eq!(decoded.sections, vip_staff());
        assert_eq!(
            decoded.resync,
            Resync::MicroHeader(MicroHeader { depth: 2, bit_length: bare.len() * 8 })
        );
    }

    #[test]
    fn legacy_bit_count_prefix_resyncs() {
        let bare = encode_sections(&vip_staff(), BlobFormat::Bare).unwrap();
        let mut blob = ((bare.len() * 8) as u16).to_be_bytes().to_vec();
        blob.extend_from_slice(&bare);
        let decoded = decode_sections(&blob, &registry(), LIMIT).unwrap();
        assert_eq!(decoded.sections, vip_staff());
        assert_eq!(decoded.resync, Resync::Magic { offset: 2 });
    }

    #[test]
    fn trailing_padding_ignored() {
        let mut blob = encode_sections(&vip_staff(), BlobFormat::Bare).unwrap();
        blob.extend_from_slice(&[0; 13]);
        assert_eq!(decode_sections(&blob, &registry(), LIMIT).unwrap().sections, vip_staff());
    }

    #[test]
    fn truncated_stream_is_framing_error() {
        let blob = encode_sections(&vip_staff(), BlobFormat::Bare).unwrap();
        let cut = &blob[..blob.len() - 3];
        assert!(matches!(decode_sections(cut, &registry(), LIMIT), Err(OverlayError::FramingError { .. })));
    }

    #[test]
    fn garbage_is_framing_error() {
        assert!(matches!(
            decode_sections(&[0u8; 40], &registry(), LIMIT),
            Err(OverlayError::FramingError { .. })
        ));
        assert!(matches!(decode_sections(&[], &registry(), LIMIT), Err(OverlayError::FramingError { .. })));
    }

    #[test]
    fn unknown_section_is_fatal() {
        let blob = encode_sections([("ADMIN", b"1".to_vec())], BlobFormat::Bare).unwrap();
        match decode_sections(&blob, &registry(), LIMIT) {
            Err(OverlayError::UnknownSection { name }) => assert_eq!(name, "ADMIN"),
            other => panic!("expected UnknownSection, got {other:?}"),
        }
    }

    #[test]
    fn truncated_record_reports_offset() {
        let framed = [3, b'V', b'I', b'P', 0, 9, b'a'];
        match parse_records(&framed, &registry()) {
            Err(OverlayError::FramingError { offset: 6, .. }) => {}
            other => panic!("expected FramingError at 6, got {other:?}"),
        }
    }

    #[test]
    fn oversized_output_rejected() {
        let blob = encode_sections([("VIP", vec![0u8; 60_000])], BlobFormat::Bare).unwrap();
        assert!(blob.len() < 1000);
        assert!(matches!(decode_sections(&blob, &registry(), 4096), Err(OverlayError::FramingError { .. })));
        assert!(decode_sections(&blob, &registry(), LIMIT).is_ok());
    }

    #[test]
    fn high_ratio_streams_inflate() {
        for n in [2_000usize, 5_000, 20_000, 65_535] {
            let sections = BTreeMap::from([("VIP".to_string(), vec![b'a'; n])]);
            let blob = encode_sections(&sections, BlobFormat::Bare).unwrap();
            assert!(blob.len() * 20 < n, "{n} bytes compressed to {}", blob.len());
            let decoded = decode_sections(&blob, &registry(), LIMIT).unwrap();
            assert_eq!(decoded.sections, sections);
        }
    }

    #[test]
    fn limit_is_exact() {
        let framed_len = frame_records([("VIP", vec![7u8; 10_000])]).unwrap().len();
        let blob = encode_sections([("VIP", vec![7u8; 10_000])], BlobFormat::Bare).unwrap();
        assert!(decode_sections(&blob, &registry(), framed_len).is_ok());
        assert!(decode_sections(&blob, &registry(), framed_len - 1).is_err());
    }

    #[test]
    fn adler32_reference_value() {
        assert_eq!(adler32(b"Wikipedia"), 0x11E6_0398);
        assert_eq!(adler32(b""), 1);
    }

    #[test]
    fn invalid_names_and_sizes_rejected() {
        assert!(matches!(frame_records([("", vec![1u8])]), Err(OverlayError::InvalidSection { .. })));
        assert!(matches!(
            frame_records([("x".repeat(256), vec![1u8])]),
            Err(OverlayError::InvalidSection { .. })
        ));
        assert!(matches!(frame_records([("VIP", vec![0u8; 65_536])]), Err(OverlayError::InvalidSection { .. })));
        assert!(frame_records([("VIP", vec![0u8; 65_535])]).is_ok());
    }

    #[test]
    fn typed_parsers() {
        let mut reg: SectionRegistry<String> = SectionRegistry::new();
        reg.register("VIP", |b: &[u8]| {
            String::from_utf8(b.to_vec()).map_err(|e| OverlayError::InvalidSection {
                name: "VIP".into(),
                reason: e.to_string(),
            })
        });
        let blob = encode_sections([("VIP", b"seat 12".to_vec())], BlobFormat::Bare).unwrap();
        let decoded = decode_sections(&blob, &reg, LIMIT).unwrap();
        assert_eq!(decoded.sections["VIP"], "seat 12");
        assert!(reg.contains("VIP"));
        assert_eq!(reg.names().collect::<Vec<_>>(), vec!["VIP"]);
    }
}
