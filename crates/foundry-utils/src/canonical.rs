//! Canonical JSON and SHA-256 hashing
//!
//! Cache keys and build-state hashes must be pure functions of their inputs.
//! Canonicalization uses RFC 8785 (JCS) so that key order and whitespace in
//! serialized structures can never perturb a hash.

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Canonicalization scheme version, recorded in artifacts that embed hashes.
pub const CANONICALIZATION_VERSION: &str = "jcs-rfc8785.v1";

/// Serialize a value to RFC 8785 canonical JSON.
///
/// # Errors
/// Returns an error if the value cannot be represented as JSON (e.g. a
/// non-string map key or a non-finite float).
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json_canonicalizer::to_string(value).context("canonical JSON serialization failed")
}

/// SHA-256 of a byte slice, lowercase hex.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// SHA-256 of a value's canonical JSON representation, lowercase hex.
///
/// # Errors
/// Propagates canonicalization failures.
pub fn sha256_canonical<T: Serialize>(value: &T) -> Result<String> {
    Ok(sha256_hex(to_canonical_json(value)?.as_bytes()))
}

/// SHA-256 of a file's bytes, lowercase hex.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn sha256_file(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(sha256_hex(&bytes))
}
