//! Update Resolution Errors

use crate::engine::hashing::HashError;
use crate::engine::store::StoreError;
use thiserror::Error;

/// Failures while resolving an update request.
///
/// "Client is already current" is deliberately not an error here; it is a
/// normal outcome carried by [`crate::engine::manifest::Outcome`].
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("No metadata found for runtime version: {runtime_version} at {bundle_path}. Error: {reason}")]
    MetadataMissing {
        runtime_version: String,
        bundle_path: String,
        reason: String,
    },
    #[error("No expo config found for runtime version: {runtime_version} at {bundle_path}. Error: {reason}")]
    ConfigMissing {
        runtime_version: String,
        bundle_path: String,
        reason: String,
    },
    #[error("No entry for platform \"{platform}\" in update metadata")]
    PlatformNotInMetadata { platform: String },
    #[error("{0}")]
    UnsupportedProtocol(String),
    #[error("Invalid {0} request header specified.")]
    MissingHeader(String),
    #[error("Invalid bundle timestamp: {0}")]
    InvalidTimestamp(i64),
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
