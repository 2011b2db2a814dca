// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! # layerqr-core
//!
//! Pure-Rust codec for hiding several independently readable data layers in
//! an ordinary-looking 2D barcode. The barcode keeps decoding to its public
//! URL; hidden layers are painted as recursive 3x3 "fractal" tiles on its
//! dark modules:
//!
//! - **Secret payload**: named sections, multiplexed and zlib-compressed,
//!   painted after a JSON header and a span of decoy filler.
//! - **Overlay**: a reserved span left blank at issuance, so a later party
//!   can append one more section without reissuing the image.
//!
//! The barcode generator and reader are external and plug in through the
//! [`MatrixGenerator`] and [`MatrixReader`] traits. The `access` module adds
//! per-field RSA-OAEP sealing and reference roles on top of the codec.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use layerqr_core::{issue, decode_layers, CodecConfig, IssueOptions, SectionRegistry};
//!
//! let config = CodecConfig::default();
//! let sections = [("VIP", b"abc".to_vec()), ("STAFF", b"xyz".to_vec())];
//! let issued = issue(&my_generator, "https://example.org/t?data=...", sections, &IssueOptions::default(), &config)?;
//! let registry = SectionRegistry::raw(["VIP", "STAFF"]);
//! let decoded = decode_layers(&issued.png, &registry, None, &config)?;
//! assert_eq!(decoded.sections["VIP"], b"abc");
//! ```

pub mod access;
pub mod config;
pub mod overlay;
pub mod raster;

pub use access::{decode_for_role, issue_ticket, attest, AccessError, KeyCache, KeyDir, Role, RoleView};
pub use config::{CodecConfig, ConfigError, Palette};
pub use overlay::{append_overlay, decode_layers, decode_many, issue, read_header};
pub use overlay::{BlobFormat, DecodedImage, Header, IssueOptions, Issued, LayoutPlan, OverlayError};
pub use overlay::{CarrierMatrix, ErrorCorrection, MatrixError, MatrixGenerator, MatrixReader};
pub use overlay::{SectionRegistry, Serializable};
pub use raster::{Canvas, RasterError};
