//! Asset Descriptors
//!
//! Builds the per-asset entries of a manifest. Every field derives from the
//! asset's byte content or from request context, never from filesystem
//! state, so two assets with identical bytes always produce identical
//! `hash` and `key` values.

use crate::engine::error::ResolveError;
use crate::engine::hashing::{base64_url_encoding, md5_hex, sha256_base64};
use crate::engine::store::{BundleRef, UpdateStore};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

/// Request-scoped inputs for descriptor URLs.
#[derive(Debug, Clone, Copy)]
pub struct AssetContext<'a> {
    pub server_address: &'a str,
    pub platform: &'a str,
    pub runtime_version: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDescriptor {
    /// SHA-256 of the asset bytes, base64url without padding.
    pub hash: String,
    /// MD5 hex of the asset bytes. Short lookup key, not integrity.
    pub key: String,
    pub file_extension: String,
    pub content_type: String,
    pub url: String,
}

/// MIME type for a file extension.
///
/// Total function: unknown extensions resolve to octet-stream rather than
/// failing the manifest build.
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "json" => "application/json",
        "js" => "application/javascript",
        "css" => "text/css",
        "html" => "text/html",
        "txt" => "text/plain",
        "xml" => "application/xml",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

/// Build a descriptor from already-fetched asset bytes.
pub fn descriptor_from_bytes(
    bytes: &[u8],
    bundle_relative_path: &str,
    ext: Option<&str>,
    is_launch_asset: bool,
    ctx: &AssetContext<'_>,
) -> AssetDescriptor {
    let hash = base64_url_encoding(&sha256_base64(bytes));
    let key = md5_hex(bytes);

    let extension_suffix = if is_launch_asset {
        "bundle"
    } else {
        ext.unwrap_or_default()
    };
    let content_type = if is_launch_asset {
        // the launch asset is always executable JS, whatever its path says
        "application/javascript"
    } else {
        content_type_for_extension(ext.unwrap_or_default())
    };

    // opaque, re-fetchable reference: the asset endpoint decodes this path
    // and serves the exact same bytes without re-resolving "latest"
    let asset_query = STANDARD.encode(bundle_relative_path.as_bytes());

    AssetDescriptor {
        hash,
        key,
        file_extension: format!(".{}", extension_suffix),
        content_type: content_type.to_string(),
        url: format!(
            "{}/api/assets?asset={}&platform={}&runtimeVersion={}",
            ctx.server_address, asset_query, ctx.platform, ctx.runtime_version
        ),
    }
}

/// Fetch one asset from the store and describe it.
pub async fn describe_asset(
    store: &dyn UpdateStore,
    bundle: &BundleRef,
    file_path: &str,
    ext: Option<&str>,
    is_launch_asset: bool,
    ctx: &AssetContext<'_>,
) -> Result<AssetDescriptor, ResolveError> {
    let bytes = store.read_file(bundle, file_path).await?;
    Ok(descriptor_from_bytes(
        &bytes,
        &bundle.file_path(file_path),
        ext,
        is_launch_asset,
        ctx,
    ))
}
