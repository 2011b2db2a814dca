// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Decoy filler bytes.
//!
//! Filler tiles only occupy a counted span, so their content is irrelevant
//! to decoding. Bytes are drawn from a small alphabet of alternating bit
//! patterns so filler tiles look busy without resembling header JSON.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Alphabet filler bytes are drawn from.
pub const DECOY_BYTES: [u8; 6] = [0xAA, 0x55, 0xF0, 0x0F, 0xCC, 0x33];

/// Source of decoy bytes.
pub struct FillerSource {
    rng: ChaCha20Rng,
}

impl FillerSource {
    /// Deterministic source, for reproducible output.
    pub fn seeded(seed: u64) -> Self {
        Self { rng: ChaCha20Rng::seed_from_u64(seed) }
    }

    /// Source seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self { rng: ChaCha20Rng::from_entropy() }
    }

    pub fn next_bytes(&mut self, n: usize) -> Vec<u8> {
        (0..n)
            .map(|_| DECOY_BYTES[self.rng.gen_range(0..DECOY_BYTES.len())])
            .collect()
    }
}
