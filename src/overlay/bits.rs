// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Byte/bit conversion helpers shared by the composer and the sections.
//!
//! Bits are stored one per `u8` (0 or 1), most-significant bit first.

/// Convert bytes to bits (MSB first within each byte).
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for bit_pos in (0..8).rev() {
            bits.push((byte >> bit_pos) & 1);
        }
    }
    bits
}

/// Convert bits back to bytes (MSB first). A trailing partial byte is
/// zero-padded on the right.
pub fn bits_to_bytes(bits: &[u8]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, &b)| acc | ((b & 1) << (7 - i)))
        })
        .collect()
}

/// Keep the first `bit_len` bits of `bytes`, clearing any bits past that
/// point in the final byte.
pub fn truncate_bits(bytes: &[u8], bit_len: usize) -> Vec<u8> {
    let keep = bit_len.div_ceil(8).min(bytes.len());
    let mut out = bytes[..keep].to_vec();
    let rem = bit_len % 8;
    if rem != 0 && keep == bit_len.div_ceil(8) {
        if let Some(last) = out.last_mut() {
            *last &= 0xFFu8 << (8 - rem);
        }
    }
    out
}
