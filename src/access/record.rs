// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Sealed field records, the content of each hidden section.
//!
//! A record is a JSON object of field name to value. Text fields and lists
//! of text are encrypted per string; boolean flags stay in the clear.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::access::cipher::FieldCipher;
use crate::access::error::Result;
use crate::overlay::{OverlayError, SectionRegistry, Serializable};

/// A field as stored inside a section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    /// Hex ciphertext of one string.
    Sealed(String),
    SealedList(Vec<String>),
}

/// A field before sealing or after opening.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlainField {
    Flag(bool),
    Text(String),
    List(Vec<String>),
}

impl From<&str> for PlainField {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<bool> for PlainField {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

/// Section content: sealed fields by name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldRecord {
    pub fields: BTreeMap<String, FieldValue>,
}

impl FieldRecord {
    /// Parse the JSON content of section `name`.
    pub fn parse(name: &str, bytes: &[u8]) -> std::result::Result<Self, OverlayError> {
        serde_json::from_slice(bytes).map_err(|e| OverlayError::InvalidSection {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serializable for FieldRecord {
    fn to_bytes(&self) -> Vec<u8> {
        // A map of strings, lists and bools always serializes.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// Registry parsing every name in `names` as a [`FieldRecord`].
pub fn record_registry<'a, I>(names: I) -> SectionRegistry<FieldRecord>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut registry = SectionRegistry::new();
    for name in names {
        let owned = name.to_string();
        registry.register(name, move |bytes: &[u8]| FieldRecord::parse(&owned, bytes));
    }
    registry
}

/// Encrypt every text field of `fields` with `key`.
pub fn seal_record<C, I, K>(cipher: &C, key: &C::PublicKey, fields: I) -> Result<FieldRecord>
where
    C: FieldCipher,
    I: IntoIterator<Item = (K, PlainField)>,
    K: Into<String>,
{
    let mut record = FieldRecord::default();
    for (name, value) in fields {
        let sealed = match value {
            PlainField::Flag(b) => FieldValue::Flag(b),
            PlainField::Text(s) => FieldValue::Sealed(cipher.encrypt(key, &s)?),
            PlainField::List(items) => FieldValue::SealedList(
                items.iter().map(|s| cipher.encrypt(key, s)).collect::<Result<Vec<_>>>()?,
            ),
        };
        record.fields.insert(name.into(), sealed);
    }
    Ok(record)
}

/// Fields recovered from a sealed record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpenedRecord {
    pub fields: BTreeMap<String, PlainField>,
    /// Fields whose ciphertext could not be decrypted with the key.
    pub unreadable: Vec<String>,
}

impl OpenedRecord {
    pub fn has_content(&self) -> bool {
        self.fields.values().any(|v| match v {
            PlainField::Flag(_) => true,
            PlainField::Text(s) => !s.is_empty(),
            PlainField::List(items) => !items.is_empty(),
        })
    }
}

/// Decrypt every field of `record`. Fields that fail to decrypt are listed
/// in [`OpenedRecord::unreadable`] instead of failing the whole record.
pub fn open_record<C: FieldCipher>(cipher: &C, key: &C::PrivateKey, record: &FieldRecord) -> OpenedRecord {
    let mut opened = OpenedRecord::default();
    for (name, value) in &record.fields {
        let plain = match value {
            FieldValue::Flag(b) => Some(PlainField::Flag(*b)),
            FieldValue::Sealed(hex) => cipher.safe_decrypt(key, hex).map(PlainField::Text),
            FieldValue::SealedList(items) => items
                .iter()
                .map(|hex| cipher.safe_decrypt(key, hex))
                .collect::<Option<Vec<_>>>()
                .map(PlainField::List),
        };
        match plain {
            Some(p) => {
                opened.fields.insert(name.clone(), p);
            }
            None => opened.unreadable.push(name.clone()),
        }
    }
    opened
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::error::AccessError;

    /// Reversible stand-in cipher: hex of the reversed string.
    struct Mirror;

    impl FieldCipher for Mirror {
        type PublicKey = ();
        type PrivateKey = ();

        fn encrypt(&self, _: &(), plaintext: &str) -> Result<String> {
            Ok(hex::encode(plaintext.chars().rev().collect::<String>()))
        }

        fn decrypt(&self, _: &(), ciphertext_hex: &str) -> Result<String> {
            let bytes = hex::decode(ciphertext_hex)?;
            let s = String::from_utf8(bytes).map_err(|_| AccessError::InvalidUtf8)?;
            Ok(s.chars().rev().collect())
        }
    }

    #[test]
    fn seal_open_roundtrip() {
        let plain = vec![
            ("seat", PlainField::from("A12")),
            ("perks", PlainField::List(vec!["lounge".into(), "parking".into()])),
            ("checked_in", PlainField::from(false)),
        ];
        let record = seal_record(&Mirror, &(), plain.clone()).unwrap();
        assert_eq!(record.fields["seat"], FieldValue::Sealed(hex::encode("21A")));
        assert_eq!(record.fields["checked_in"], FieldValue::Flag(false));

        let opened = open_record(&Mirror, &(), &record);
        assert!(opened.unreadable.is_empty());
        assert!(opened.has_content());
        for (name, value) in plain {
            assert_eq!(opened.fields[name], value);
        }
    }

    #[test]
    fn bytes_roundtrip_through_parser() {
        let record = seal_record(&Mirror, &(), [("seat", PlainField::from("B3"))]).unwrap();
        let parsed = FieldRecord::parse("VIP", &record.to_bytes()).unwrap();
        assert_eq!(parsed, record);
        assert!(matches!(FieldRecord::parse("VIP", b"[1,2]"), Err(OverlayError::InvalidSection { .. })));
    }

    #[test]
    fn unreadable_fields_are_reported() {
        let mut record = FieldRecord::default();
        record.fields.insert("bad".into(), FieldValue::Sealed("nothex".into()));
        record.fields.insert("empty".into(), FieldValue::Sealed(String::new()));
        let opened = open_record(&Mirror, &(), &record);
        assert_eq!(opened.unreadable, vec!["bad".to_string(), "empty".to_string()]);
        assert!(!opened.has_content());
    }
}
