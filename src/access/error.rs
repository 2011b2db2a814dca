// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Error types for the role layer.

use std::path::PathBuf;

use thiserror::Error;

use crate::overlay::OverlayError;

/// Errors from key handling, field encryption and role decoding.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The PEM block is not an RSA key in a supported encoding.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),
    /// A key file that was required does not exist.
    #[error("key file not found: {}", .0.display())]
    KeyNotFound(PathBuf),
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encryption failed: {0}")]
    Encrypt(String),
    #[error("decryption failed: {0}")]
    Decrypt(String),
    #[error("ciphertext is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("decrypted field is not valid UTF-8")]
    InvalidUtf8,
    /// The public URL or its `data` parameter is malformed.
    #[error("public payload: {0}")]
    PublicPayload(String),
    #[error("unknown role {0:?}")]
    UnknownRole(String),
    #[error(transparent)]
    Overlay(#[from] OverlayError),
}

pub type Result<T> = std::result::Result<T, AccessError>;
