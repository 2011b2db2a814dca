// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Public payload URL.
//!
//! The barcode itself encodes `<base>?data=<percent-encoded base64 JSON>`.
//! The JSON is compact with keys sorted, so equal records produce equal
//! URLs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::access::error::{AccessError, Result};

const DATA_PARAM: &str = "data=";

/// Build the public URL for `record` under `base_url`.
pub fn build_public_url<T: Serialize>(base_url: &str, record: &T) -> Result<String> {
    // Round-trip through Value: its maps are key-sorted.
    let value = serde_json::to_value(record).map_err(|e| AccessError::PublicPayload(e.to_string()))?;
    let json = serde_json::to_string(&value).map_err(|e| AccessError::PublicPayload(e.to_string()))?;
    Ok(format!("{base_url}?{DATA_PARAM}{}", percent_encode(&STANDARD.encode(json))))
}

/// Recover the record from a public URL.
pub fn parse_public_url<T: DeserializeOwned>(url: &str) -> Result<T> {
    let query = url
        .split_once('?')
        .map(|(_, q)| q)
        .ok_or_else(|| AccessError::PublicPayload("URL has no query".into()))?;
    let encoded = query
        .split('&')
        .find_map(|pair| pair.strip_prefix(DATA_PARAM))
        .ok_or_else(|| AccessError::PublicPayload("missing data parameter".into()))?;
    let b64 = percent_decode(encoded)?;
    let json = STANDARD
        .decode(b64.as_bytes())
        .map_err(|e| AccessError::PublicPayload(format!("bad base64: {e}")))?;
    serde_json::from_slice(&json).map_err(|e| AccessError::PublicPayload(format!("bad JSON: {e}")))
}

/// Percent-encode everything except unreserved characters and `/`.
fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 3 / 2);
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~' | b'/') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn percent_decode(s: &str) -> Result<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| AccessError::PublicPayload(format!("bad escape at {i}")))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| AccessError::PublicPayload("data is not UTF-8".into()))
}
