//! Code Signing
//!
//! Optional detached RSA-SHA256 signatures over response payloads. The key
//! is loaded once at startup and shared read-only; clients opt in per
//! request with the `expo-expect-signature` header.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::sha2::Sha256;
use rsa::signature::{SignatureEncoding, Signer as _};
use rsa::RsaPrivateKey;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Signing errors
#[derive(Error, Debug)]
pub enum SignError {
    #[error("Code signing requested but no key supplied when starting server.")]
    NoKeyConfigured,
    #[error("Failed to read private key {path}: {source}")]
    KeyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse private key: {0}")]
    KeyParse(String),
}

/// Response signer with an optional configured key.
pub struct Signer {
    key: Option<RsaPrivateKey>,
}

impl Signer {
    /// A signer with no key. Signature requests will be rejected.
    pub fn unsigned() -> Self {
        Self { key: None }
    }

    /// Load the key once at startup. `None` means signing is not configured.
    pub fn from_pem_file(path: Option<&Path>) -> Result<Self, SignError> {
        let Some(path) = path else {
            return Ok(Self::unsigned());
        };
        let pem = std::fs::read_to_string(path).map_err(|e| SignError::KeyRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_pem(&pem)
    }

    /// Parse a PKCS#8 or PKCS#1 PEM private key.
    pub fn from_pem(pem: &str) -> Result<Self, SignError> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| SignError::KeyParse(e.to_string()))?;
        Ok(Self { key: Some(key) })
    }

    pub fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    /// RSA-SHA256 (PKCS#1 v1.5) signature over the exact payload bytes,
    /// base64 encoded.
    pub fn sign(&self, payload: &str) -> Result<String, SignError> {
        let key = self.key.as_ref().ok_or(SignError::NoKeyConfigured)?;
        let signing_key = SigningKey::<Sha256>::new(key.clone());
        let signature = signing_key.sign(payload.as_bytes());
        Ok(STANDARD.encode(signature.to_bytes()))
    }

    /// Sign when the client asked for it.
    ///
    /// Requested without a configured key is a hard error (surfaced to the
    /// client as 400), never a silently unsigned response.
    pub fn maybe_sign(&self, payload: &str, requested: bool) -> Result<Option<String>, SignError> {
        if !requested {
            return Ok(None);
        }
        let signature = self.sign(payload)?;
        Ok(Some(signature_dictionary(&signature)))
    }
}

/// Structured-field dictionary carrying the signature, e.g.
/// `sig="<base64>", keyid="main"`.
fn signature_dictionary(signature: &str) -> String {
    format!("sig=\"{}\", keyid=\"main\"", signature)
}
