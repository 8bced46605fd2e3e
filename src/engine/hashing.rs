//! Content Addressing
//!
//! Pure hashing helpers that derive stable identities for assets and
//! updates from raw byte content.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Hashing errors
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Digest too short for UUID conversion: need 32 hex chars, got {0}")]
    DigestTooShort(usize),
    #[error("Digest is not hex-encoded ASCII")]
    NotHex,
}

/// SHA-256 digest of `bytes`, hex encoded.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 digest of `bytes`, standard base64 encoded.
pub fn sha256_base64(bytes: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(bytes))
}

/// MD5 digest of `bytes`, hex encoded.
///
/// Used only for the short asset `key`, never for integrity.
pub fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Convert a standard base64 string to the base64url alphabet, unpadded.
pub fn base64_url_encoding(base64_encoded: &str) -> String {
    base64_encoded
        .replace('+', "-")
        .replace('/', "_")
        .trim_end_matches('=')
        .to_string()
}

/// Slice the first 32 chars of a hex digest into the protocol's
/// 8-4-4-4-12 UUID textual shape.
///
/// No version/variant bits are set, so the result is UUID-shaped but not a
/// conformant UUID. Clients compare the value string-exact, so the slicing
/// must stay byte-for-byte identical.
pub fn sha256_hash_to_uuid(hex_digest: &str) -> Result<String, HashError> {
    if !hex_digest.is_ascii() {
        return Err(HashError::NotHex);
    }
    if hex_digest.len() < 32 {
        return Err(HashError::DigestTooShort(hex_digest.len()));
    }
    Ok(format!(
        "{}-{}-{}-{}-{}",
        &hex_digest[0..8],
        &hex_digest[8..12],
        &hex_digest[12..16],
        &hex_digest[16..20],
        &hex_digest[20..32]
    ))
}
