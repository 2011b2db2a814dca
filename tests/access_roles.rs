// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Role-gated decoding with real RSA keys on synthetic carriers.

mod common;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use common::{StaticReader, SyntheticGenerator};
use layerqr_core::access::{build_public_url, PlainField, SectionFields, NO_INFO_NOTICE};
use layerqr_core::{
    attest, decode_for_role, issue_ticket, AccessError, Canvas, CodecConfig, IssueOptions, Issued, KeyCache, KeyDir,
    OverlayError, Role,
};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{json, Value};
use tempfile::TempDir;

fn key_dir() -> &'static TempDir {
    static KEYS: OnceLock<TempDir> = OnceLock::new();
    KEYS.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = rand::thread_rng();
        for section in ["vip", "staff", "asserter"] {
            let private = RsaPrivateKey::new(&mut rng, 1024).unwrap();
            let public = RsaPublicKey::from(&private);
            write_pem(dir.path(), &format!("{section}_private.pem"), private.to_pkcs8_pem(LineEnding::LF).unwrap().as_str());
            write_pem(dir.path(), &format!("{section}_public.pem"), &public.to_public_key_pem(LineEnding::LF).unwrap());
        }
        dir
    })
}

fn write_pem(dir: &Path, name: &str, pem: &str) {
    fs::write(dir.join(name), pem).unwrap();
}

fn config() -> CodecConfig {
    CodecConfig { filler_tile_count: 6, ..CodecConfig::default() }
}

fn public_record() -> Value {
    json!({"event": "Gala", "seat": "A1"})
}

fn hidden() -> BTreeMap<String, SectionFields> {
    BTreeMap::from([
        (
            "VIP".to_string(),
            vec![
                ("lounge".to_string(), PlainField::from("North terrace")),
                ("backstage".to_string(), PlainField::from(true)),
            ],
        ),
        ("STAFF".to_string(), vec![("note".to_string(), PlainField::from("check ID"))]),
    ])
}

fn issue_options() -> IssueOptions {
    IssueOptions { reserve_bits: 2048, asserter_max_depth: Some(1), ..IssueOptions::default() }
}

fn issued_ticket(keys: &KeyDir, cache: &mut KeyCache) -> Issued {
    issue_ticket(&SyntheticGenerator, &public_record(), &hidden(), keys, cache, &issue_options(), &config()).unwrap()
}

fn reader() -> StaticReader {
    StaticReader(Some(build_public_url(&config().public_base_url, &public_record()).unwrap()))
}

#[test]
fn each_role_reads_its_sections() {
    let keys = KeyDir::new(key_dir().path());
    let mut cache = KeyCache::new();
    let issued = issued_ticket(&keys, &mut cache);
    let config = config();

    let general = decode_for_role(&issued.png, Role::General, &reader(), &keys, &mut cache, &config);
    assert_eq!(general.general, Some(public_record()));
    assert!(general.layers.is_empty());
    assert!(general.hidden_errors.is_empty());

    let vip = decode_for_role(&issued.png, Role::Vip, &reader(), &keys, &mut cache, &config);
    assert_eq!(vip.general, Some(public_record()));
    assert_eq!(vip.layers.keys().collect::<Vec<_>>(), ["VIP"]);
    assert_eq!(vip.layers["VIP"].fields["lounge"], PlainField::from("North terrace"));
    assert_eq!(vip.layers["VIP"].fields["backstage"], PlainField::Flag(true));
    assert!(vip.hidden_errors.is_empty(), "{:?}", vip.hidden_errors);
    assert_eq!(vip.notice, None);

    let staff = decode_for_role(&issued.png, Role::Staff, &reader(), &keys, &mut cache, &config);
    assert_eq!(staff.layers.keys().collect::<Vec<_>>(), ["STAFF"]);
    assert_eq!(staff.layers["STAFF"].fields["note"], PlainField::from("check ID"));

    let admin = decode_for_role(&issued.png, Role::Admin, &reader(), &keys, &mut cache, &config);
    assert_eq!(admin.layers.keys().collect::<Vec<_>>(), ["STAFF", "VIP"]);

    let asserter = decode_for_role(&issued.png, Role::Asserter, &reader(), &keys, &mut cache, &config);
    assert!(asserter.layers.is_empty());
    assert_eq!(asserter.notice, Some(NO_INFO_NOTICE));
    assert_eq!(asserter.general, Some(public_record()));
}

#[test]
fn attested_overlay_visible_to_asserter() {
    let keys = KeyDir::new(key_dir().path());
    let mut cache = KeyCache::new();
    let config = config();
    let issued = issued_ticket(&keys, &mut cache);

    let fields = vec![("checked_in".to_string(), PlainField::from("19:04 gate B"))];
    let attested = attest(&issued.png, fields, 1, &keys, &mut cache, &config).unwrap();

    let asserter = decode_for_role(&attested, Role::Asserter, &reader(), &keys, &mut cache, &config);
    assert_eq!(asserter.layers["ASSERTER"].fields["checked_in"], PlainField::from("19:04 gate B"));
    assert_eq!(asserter.notice, None);

    // The secret payload is untouched by the overlay.
    let vip = decode_for_role(&attested, Role::Vip, &reader(), &keys, &mut cache, &config);
    assert_eq!(vip.layers["VIP"].fields["lounge"], PlainField::from("North terrace"));
}

#[test]
fn public_layer_survives_hidden_failure() {
    let keys = KeyDir::new(key_dir().path());
    let mut cache = KeyCache::new();
    let png = Canvas::new(300, 300, layerqr_core::raster::BLACK).unwrap().to_png().unwrap();

    let view = decode_for_role(&png, Role::Vip, &reader(), &keys, &mut cache, &config());
    assert_eq!(view.general, Some(public_record()));
    assert_eq!(view.hidden_errors.len(), 1);
    assert!(view.layers.is_empty());
    assert_eq!(view.notice, Some(NO_INFO_NOTICE));
}

#[test]
fn hidden_layers_survive_unreadable_barcode() {
    let keys = KeyDir::new(key_dir().path());
    let mut cache = KeyCache::new();
    let issued = issued_ticket(&keys, &mut cache);

    let view = decode_for_role(&issued.png, Role::Staff, &StaticReader(None), &keys, &mut cache, &config());
    assert!(view.general.is_none());
    assert!(view.general_error.is_some());
    assert_eq!(view.layers["STAFF"].fields["note"], PlainField::from("check ID"));
}

#[test]
fn missing_private_key_reported() {
    let keys = KeyDir::new(key_dir().path());
    let mut cache = KeyCache::new();
    let issued = issued_ticket(&keys, &mut cache);

    let empty = tempfile::tempdir().unwrap();
    let view = decode_for_role(&issued.png, Role::Vip, &reader(), &KeyDir::new(empty.path()), &mut cache, &config());
    assert!(view.layers.is_empty());
    assert!(view.hidden_errors.iter().any(|e| e.starts_with("VIP:")), "{:?}", view.hidden_errors);
    assert_eq!(view.notice, Some(NO_INFO_NOTICE));
    assert_eq!(view.general, Some(public_record()));
}

#[test]
fn overlay_section_cannot_be_issued_as_secret() {
    let keys = KeyDir::new(key_dir().path());
    let mut cache = KeyCache::new();
    let hidden = BTreeMap::from([("ASSERTER".to_string(), vec![("x".to_string(), PlainField::from("y"))])]);
    let result =
        issue_ticket(&SyntheticGenerator, &public_record(), &hidden, &keys, &mut cache, &issue_options(), &config());
    assert!(matches!(result, Err(AccessError::Overlay(OverlayError::InvalidSection { .. }))));
}
