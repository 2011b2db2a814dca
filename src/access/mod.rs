// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Role layer on top of the layered codec.
//!
//! Hidden sections hold [`FieldRecord`]s whose text fields are sealed with
//! the section's public key. A role reads a section only when it holds the
//! matching private key from a [`KeyDir`]. The public barcode payload is
//! readable by everyone.
//!
//! Decoding keeps layers apart: a failure in a hidden layer is reported in
//! the [`RoleView`] while the public payload is still returned.

pub mod cipher;
pub mod error;
pub mod public;
pub mod record;
pub mod role;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

pub use cipher::{parse_private_pem, parse_public_pem, FieldCipher, KeyCache, RsaOaepCipher};
pub use error::AccessError;
pub use public::{build_public_url, parse_public_url};
pub use record::{open_record, record_registry, seal_record, FieldRecord, FieldValue, OpenedRecord, PlainField};
pub use role::{KeyDir, Role, ASSERTER, OVERLAY_SECTIONS, SECRET_SECTIONS, STAFF, VIP};

use crate::config::CodecConfig;
use crate::overlay::compose::{extract_overlay, extract_secret, locate_header};
use crate::overlay::sections::decode_sections;
use crate::overlay::{append_overlay, issue, BlobFormat, IssueOptions, Issued, MatrixGenerator, MatrixReader, OverlayError};
use crate::raster::Canvas;
use error::Result;

/// Shown when a role can read nothing beyond the public payload.
pub const NO_INFO_NOTICE: &str = "No additional information found for this ticket.";

/// Plain fields of one hidden section, before sealing.
pub type SectionFields = Vec<(String, PlainField)>;

/// Seal `hidden` sections with their public keys and issue the image.
///
/// The public record becomes the barcode URL under
/// [`CodecConfig::public_base_url`]. Only [`SECRET_SECTIONS`] are accepted.
pub fn issue_ticket<G, P>(
    generator: &G,
    public_record: &P,
    hidden: &BTreeMap<String, SectionFields>,
    keys: &KeyDir,
    cache: &mut KeyCache,
    options: &IssueOptions,
    config: &CodecConfig,
) -> Result<Issued>
where
    G: MatrixGenerator + ?Sized,
    P: Serialize,
{
    let url = build_public_url(&config.public_base_url, public_record)?;
    let mut records = BTreeMap::new();
    for (section, fields) in hidden {
        if !SECRET_SECTIONS.contains(&section.as_str()) {
            return Err(OverlayError::InvalidSection {
                name: section.clone(),
                reason: "not a secret payload section".into(),
            }
            .into());
        }
        let path = keys.public_key_path(section);
        let key = cache
            .public_key(&path, true)?
            .ok_or_else(|| AccessError::KeyNotFound(path.clone()))?;
        records.insert(section.clone(), seal_record(&RsaOaepCipher, key, fields.iter().cloned())?);
    }
    let issued = issue(generator, &url, &records, options, config)?;
    info!(sections = records.len(), version = issued.version, "ticket issued");
    Ok(issued)
}

/// Seal `fields` with the asserter key and append them as the overlay.
pub fn attest(
    png: &[u8],
    fields: SectionFields,
    depth: u8,
    keys: &KeyDir,
    cache: &mut KeyCache,
    config: &CodecConfig,
) -> Result<Vec<u8>> {
    let path = keys.public_key_path(ASSERTER);
    let key = cache
        .public_key(&path, true)?
        .ok_or_else(|| AccessError::KeyNotFound(path.clone()))?;
    let record = seal_record(&RsaOaepCipher, key, fields)?;
    Ok(append_overlay(png, [(ASSERTER, record)], depth, BlobFormat::Bare, config)?)
}

/// What one role sees in an image.
#[derive(Clone, Debug, Default)]
pub struct RoleView {
    pub role: Option<Role>,
    pub public_url: Option<String>,
    pub general: Option<Value>,
    pub general_error: Option<String>,
    /// Opened hidden sections by name.
    pub layers: BTreeMap<String, OpenedRecord>,
    /// Failures in hidden layers; they never hide the public payload.
    pub hidden_errors: Vec<String>,
    pub notice: Option<&'static str>,
}

/// Decode everything `role` may read from an image.
pub fn decode_for_role<R: MatrixReader + ?Sized>(
    png: &[u8],
    role: Role,
    reader: &R,
    keys: &KeyDir,
    cache: &mut KeyCache,
    config: &CodecConfig,
) -> RoleView {
    let mut view = RoleView { role: Some(role), ..RoleView::default() };
    let canvas = match Canvas::from_png(png) {
        Ok(c) => c,
        Err(e) => {
            view.general_error = Some(e.to_string());
            return view;
        }
    };

    match reader.decode_matrix(&canvas) {
        Some(url) => {
            match parse_public_url::<Value>(&url) {
                Ok(v) => view.general = Some(v),
                Err(e) => view.general_error = Some(e.to_string()),
            }
            view.public_url = Some(url);
        }
        None => view.general_error = Some("barcode could not be read".into()),
    }

    let sections = role.readable_sections();
    if sections.is_empty() {
        return view;
    }

    if let Err(e) = read_hidden(&canvas, role, keys, cache, config, &mut view) {
        debug!(%role, error = %e, "hidden layer failed");
        view.hidden_errors.push(e.to_string());
    }
    if !view.layers.values().any(OpenedRecord::has_content) {
        view.notice = Some(NO_INFO_NOTICE);
    }
    view
}

fn read_hidden(
    canvas: &Canvas,
    role: Role,
    keys: &KeyDir,
    cache: &mut KeyCache,
    config: &CodecConfig,
    view: &mut RoleView,
) -> Result<()> {
    let layout = locate_header(canvas, config)?;

    let mut found = BTreeMap::new();
    if role.reads_overlay() {
        let registry = record_registry(OVERLAY_SECTIONS);
        if let Some(hit) = extract_overlay(canvas, &layout, &registry, config) {
            found.extend(hit.sections);
        }
    } else {
        let secret = extract_secret(canvas, &layout, config.bit_threshold)?;
        let registry = record_registry(SECRET_SECTIONS);
        found.extend(decode_sections(&secret, &registry, config.decompress_limit)?.sections);
    }

    for &section in role.readable_sections() {
        let Some(record) = found.get(section) else {
            continue;
        };
        let path = keys.private_key_path(section);
        match cache.private_key(&path, true) {
            Ok(Some(key)) => {
                let opened = open_record(&RsaOaepCipher, key, record);
                if !opened.unreadable.is_empty() {
                    view.hidden_errors
                        .push(format!("{section}: cannot decrypt {}", opened.unreadable.join(", ")));
                }
                view.layers.insert(section.to_string(), opened);
            }
            Ok(None) => view.hidden_errors.push(format!("{section}: no private key")),
            Err(e) => view.hidden_errors.push(format!("{section}: {e}")),
        }
    }
    Ok(())
}
