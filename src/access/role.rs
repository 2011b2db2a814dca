// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Reference roles and the sections each may read.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::access::error::AccessError;

/// Section carrying VIP-only fields.
pub const VIP: &str = "VIP";
/// Section carrying staff-only fields.
pub const STAFF: &str = "STAFF";
/// Section appended later into the overlay reservation.
pub const ASSERTER: &str = "ASSERTER";

/// Sections that may appear in the secret payload.
pub const SECRET_SECTIONS: [&str; 2] = [VIP, STAFF];
/// Sections that may appear in the overlay.
pub const OVERLAY_SECTIONS: [&str; 1] = [ASSERTER];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    General,
    Vip,
    Staff,
    Asserter,
    Admin,
}

impl Role {
    pub const ALL: [Role; 5] = [Role::General, Role::Vip, Role::Staff, Role::Asserter, Role::Admin];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::General => "general",
            Role::Vip => "vip",
            Role::Staff => "staff",
            Role::Asserter => "asserter",
            Role::Admin => "admin",
        }
    }

    /// Sections this role decrypts.
    pub fn readable_sections(self) -> &'static [&'static str] {
        match self {
            Role::General => &[],
            Role::Vip => &[VIP],
            Role::Staff => &[STAFF],
            Role::Asserter => &[ASSERTER],
            Role::Admin => &[VIP, STAFF],
        }
    }

    /// True when this role reads the overlay rather than the secret payload.
    pub fn reads_overlay(self) -> bool {
        self.readable_sections().iter().any(|s| OVERLAY_SECTIONS.contains(s))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AccessError::UnknownRole(s.to_string()))
    }
}

/// Directory of `<section>_private.pem` / `<section>_public.pem` files,
/// with section names lowercased.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyDir {
    root: PathBuf,
}

impl KeyDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn public_key_path(&self, section: &str) -> PathBuf {
        self.root.join(format!("{}_public.pem", section.to_ascii_lowercase()))
    }

    pub fn private_key_path(&self, section: &str) -> PathBuf {
        self.root.join(format!("{}_private.pem", section.to_ascii_lowercase()))
    }
}
