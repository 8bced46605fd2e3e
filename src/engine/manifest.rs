//! Update Resolution
//!
//! Classifies the latest bundle and assembles the response payload: a full
//! update manifest, a rollback directive, or the no-update outcome. The
//! decision is returned as an explicit [`Outcome`] so the dispatcher can
//! pattern-match instead of catching control-flow errors.

use crate::engine::assets::{describe_asset, AssetContext, AssetDescriptor};
use crate::engine::error::ResolveError;
use crate::engine::hashing::sha256_hash_to_uuid;
use crate::engine::metadata::{load_client_config, load_metadata, LoadedMetadata};
use crate::engine::store::{BundleRef, StoreError, UpdateStore};
use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::future::try_join_all;
use futures_util::try_join;
use serde::Serialize;
use serde_json::Value;

/// What kind of update a bundle represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateType {
    NormalUpdate,
    Rollback,
}

/// A bundle is a rollback iff it carries a rollback marker. Pure existence
/// check; the marker's content is ignored.
pub async fn classify(
    store: &dyn UpdateStore,
    bundle: &BundleRef,
) -> Result<UpdateType, ResolveError> {
    let marker = store.rollback_marker(bundle).await?;
    Ok(if marker.is_some() {
        UpdateType::Rollback
    } else {
        UpdateType::NormalUpdate
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateManifest {
    pub id: String,
    pub created_at: String,
    pub runtime_version: String,
    pub launch_asset: AssetDescriptor,
    pub assets: Vec<AssetDescriptor>,
    pub metadata: Value,
    pub extra: ManifestExtra,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestExtra {
    #[serde(rename = "expoClient")]
    pub expo_client: Value,
}

/// Instruction sent instead of a manifest.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Directive {
    #[serde(rename = "rollBackToEmbedded")]
    RollBackToEmbedded { parameters: RollBackParameters },
    #[serde(rename = "noUpdateAvailable")]
    NoUpdateAvailable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollBackParameters {
    pub commit_time: String,
}

impl Directive {
    pub fn roll_back_to_embedded(commit_time: DateTime<Utc>) -> Self {
        Self::RollBackToEmbedded {
            parameters: RollBackParameters {
                commit_time: iso8601(commit_time),
            },
        }
    }

    pub fn no_update_available() -> Self {
        Self::NoUpdateAvailable
    }
}

/// Resolution result for one request.
#[derive(Debug, Clone)]
pub enum Outcome {
    Manifest(UpdateManifest),
    RollBack(Directive),
    /// Client is already current. Normal short-circuit, not an error.
    NoUpdateAvailable,
}

/// Request inputs the state machine needs.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub runtime_version: &'a str,
    pub platform: &'a str,
    pub protocol_version: i32,
    pub current_update_id: Option<&'a str>,
    pub embedded_update_id: Option<&'a str>,
    pub server_address: &'a str,
}

/// Drive the outcome state machine for an already-located bundle.
pub async fn resolve_update(
    store: &dyn UpdateStore,
    bundle: &BundleRef,
    ctx: &ResolveContext<'_>,
) -> Result<Outcome, ResolveError> {
    match classify(store, bundle).await? {
        UpdateType::NormalUpdate => resolve_normal_update(store, bundle, ctx).await,
        UpdateType::Rollback => resolve_rollback(store, bundle, ctx).await,
    }
}

async fn resolve_normal_update(
    store: &dyn UpdateStore,
    bundle: &BundleRef,
    ctx: &ResolveContext<'_>,
) -> Result<Outcome, ResolveError> {
    let LoadedMetadata {
        metadata,
        update_id_hex,
    } = load_metadata(store, bundle, ctx.runtime_version).await?;
    let update_id = sha256_hash_to_uuid(&update_id_hex)?;

    if ctx.protocol_version == 1 && ctx.current_update_id == Some(update_id.as_str()) {
        return Ok(Outcome::NoUpdateAvailable);
    }

    let created_at = DateTime::<Utc>::from_timestamp_millis(bundle.timestamp_ms)
        .ok_or(ResolveError::InvalidTimestamp(bundle.timestamp_ms))?;

    let expo_config = load_client_config(store, bundle, ctx.runtime_version).await?;

    let files = metadata
        .file_metadata
        .get(ctx.platform)
        .ok_or_else(|| ResolveError::PlatformNotInMetadata {
            platform: ctx.platform.to_string(),
        })?;

    let asset_ctx = AssetContext {
        server_address: ctx.server_address,
        platform: ctx.platform,
        runtime_version: ctx.runtime_version,
    };

    // assets resolve concurrently; try_join_all keeps the declared order
    let launch_future = describe_asset(store, bundle, &files.bundle, None, true, &asset_ctx);
    let asset_futures = files
        .assets
        .iter()
        .map(|asset| describe_asset(store, bundle, &asset.path, Some(&asset.ext), false, &asset_ctx));
    let (launch_asset, assets) = try_join!(launch_future, try_join_all(asset_futures))?;

    Ok(Outcome::Manifest(UpdateManifest {
        id: update_id,
        created_at: iso8601(created_at),
        runtime_version: ctx.runtime_version.to_string(),
        launch_asset,
        assets,
        metadata: Value::Object(Default::default()),
        extra: ManifestExtra {
            expo_client: merge_channel(expo_config, metadata.channel),
        },
    }))
}

async fn resolve_rollback(
    store: &dyn UpdateStore,
    bundle: &BundleRef,
    ctx: &ResolveContext<'_>,
) -> Result<Outcome, ResolveError> {
    if ctx.protocol_version == 0 {
        return Err(ResolveError::UnsupportedProtocol(
            "Rollbacks not supported on protocol version 0".to_string(),
        ));
    }

    let embedded_update_id = ctx
        .embedded_update_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ResolveError::MissingHeader("Expo-Embedded-Update-ID".to_string()))?;

    if ctx.current_update_id == Some(embedded_update_id) {
        return Ok(Outcome::NoUpdateAvailable);
    }

    let commit_time = store
        .rollback_marker(bundle)
        .await?
        .ok_or_else(|| StoreError::FileNotFound(bundle.file_path("rollback")))?;

    Ok(Outcome::RollBack(Directive::roll_back_to_embedded(
        commit_time,
    )))
}

/// Guard for the no-update response path: protocol 0 has no representation
/// for this outcome.
pub fn no_update_directive(protocol_version: i32) -> Result<Directive, ResolveError> {
    if protocol_version == 0 {
        return Err(ResolveError::UnsupportedProtocol(
            "NoUpdateAvailable directive not available in protocol version 0".to_string(),
        ));
    }
    Ok(Directive::no_update_available())
}

/// Merge the bundle's channel label into the public client config.
fn merge_channel(config: Value, channel: Option<String>) -> Value {
    let mut map = match config {
        Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("config".to_string(), other);
            map
        }
    };
    if let Some(channel) = channel {
        map.insert("channel".to_string(), Value::String(channel));
    }
    Value::Object(map)
}

fn iso8601(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}
