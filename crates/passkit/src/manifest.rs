//! Manifest generation.
//!
//! The manifest is a flat JSON object mapping every package member's file
//! name to the lowercase hex digest of its uncompressed bytes. The reading
//! client rejects a package whose members do not match it exactly, and the
//! signature is computed over its serialized bytes.

use crate::archive::PackageMember;
use crate::{Error, Result};
use rayon::prelude::*;
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Name of the pass document inside the package.
pub const PASS_FILE: &str = "pass.json";

/// Name of the manifest inside the package.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Name of the detached signature inside the package.
pub const SIGNATURE_FILE: &str = "signature";

/// Hash used for manifest entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// SHA-1, the digest every reading client accepts.
    #[default]
    Sha1,
    /// SHA-256.
    Sha256,
}

impl DigestAlgorithm {
    /// Hashes `data` and returns the lowercase hex digest.
    pub fn hex_digest(&self, data: &[u8]) -> String {
        match self {
            DigestAlgorithm::Sha1 => hex::encode(Sha1::digest(data)),
            DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" | "sha-1" => Ok(DigestAlgorithm::Sha1),
            "sha256" | "sha-256" => Ok(DigestAlgorithm::Sha256),
            other => Err(Error::Config(format!("Unknown digest algorithm: {}", other))),
        }
    }
}

/// Digest map over the members of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    algorithm: DigestAlgorithm,
    digests: BTreeMap<String, String>,
}

impl Manifest {
    /// Hashes every member except the manifest and signature themselves.
    ///
    /// Members are keyed by their base file name; directory components in a
    /// member name are dropped.
    pub fn build(members: &[PackageMember], algorithm: DigestAlgorithm) -> Self {
        let digests = members
            .par_iter()
            .filter_map(|member| {
                let name = base_name(&member.name);
                if name == MANIFEST_FILE || name == SIGNATURE_FILE {
                    return None;
                }
                Some((name, algorithm.hex_digest(&member.content)))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .collect();

        Self { algorithm, digests }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// File name to hex digest, ordered by file name.
    pub fn digests(&self) -> &BTreeMap<String, String> {
        &self.digests
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.digests.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// Returns `true` if `content` hashes to the recorded digest for `name`.
    pub fn verify(&self, name: &str, content: &[u8]) -> bool {
        self.get(name)
            .is_some_and(|digest| digest == self.algorithm.hex_digest(content))
    }

    /// Serializes the manifest as compact JSON, keys in sorted order.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.digests)?)
    }
}

fn base_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}
