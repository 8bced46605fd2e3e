//! Bundle Metadata & Client Config
//!
//! Loads a bundle's `metadata.json` and public `expoConfig.json`. The
//! update's identity is a SHA-256 digest over the raw metadata bytes, so
//! the bytes are hashed exactly as stored, before parsing.

use crate::engine::error::ResolveError;
use crate::engine::hashing::sha256_hex;
use crate::engine::store::{BundleRef, UpdateStore};
use serde::Deserialize;
use std::collections::HashMap;

/// Parsed `metadata.json`. Unknown fields are tolerated.
#[derive(Debug, Clone, Deserialize)]
pub struct BundleMetadata {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub bundler: Option<String>,
    #[serde(rename = "fileMetadata")]
    pub file_metadata: HashMap<String, PlatformFiles>,
    #[serde(default)]
    pub channel: Option<String>,
}

/// Per-platform file listing inside `metadata.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformFiles {
    pub bundle: String,
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetEntry {
    pub path: String,
    pub ext: String,
}

/// Metadata plus the update identity derived from its raw bytes.
#[derive(Debug, Clone)]
pub struct LoadedMetadata {
    pub metadata: BundleMetadata,
    /// SHA-256 hex digest of the raw `metadata.json` bytes.
    pub update_id_hex: String,
}

pub async fn load_metadata(
    store: &dyn UpdateStore,
    bundle: &BundleRef,
    runtime_version: &str,
) -> Result<LoadedMetadata, ResolveError> {
    let missing = |reason: String| ResolveError::MetadataMissing {
        runtime_version: runtime_version.to_string(),
        bundle_path: bundle.path.clone(),
        reason,
    };

    let raw = store
        .read_file(bundle, "metadata.json")
        .await
        .map_err(|e| missing(e.to_string()))?;
    let metadata: BundleMetadata =
        serde_json::from_slice(&raw).map_err(|e| missing(e.to_string()))?;

    Ok(LoadedMetadata {
        metadata,
        update_id_hex: sha256_hex(&raw),
    })
}

pub async fn load_client_config(
    store: &dyn UpdateStore,
    bundle: &BundleRef,
    runtime_version: &str,
) -> Result<serde_json::Value, ResolveError> {
    let missing = |reason: String| ResolveError::ConfigMissing {
        runtime_version: runtime_version.to_string(),
        bundle_path: bundle.path.clone(),
        reason,
    };

    let raw = store
        .read_file(bundle, "expoConfig.json")
        .await
        .map_err(|e| missing(e.to_string()))?;
    serde_json::from_slice(&raw).map_err(|e| missing(e.to_string()))
}
