//! Update Bundle Store
//!
//! Abstracts where published update bundles live. The resolution pipeline
//! depends only on the [`UpdateStore`] trait; the backing store is either a
//! local directory tree or a GitHub repository.
//!
//! Layout contract (both backends):
//! `updates/<runtimeVersion>/<timestampMillis>/{metadata.json, expoConfig.json, rollback?, assets...}`

pub mod github;
pub mod local;

pub use github::GitHubStore;
pub use local::LocalStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Store access errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No updates found for runtime version: {0}")]
    RuntimeVersionNotFound(String),
    #[error("Failed to fetch {0}")]
    FileNotFound(String),
    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GitHub API request failed: {status} for {url}")]
    Api {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("Invalid asset path: {0}")]
    InvalidPath(String),
}

/// A published, immutable update bundle.
///
/// `path` is repo-relative (`updates/<runtimeVersion>/<timestampMillis>`);
/// the trailing timestamp segment doubles as the bundle's creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleRef {
    pub path: String,
    pub timestamp_ms: i64,
}

impl BundleRef {
    pub fn new(runtime_version: &str, timestamp_ms: i64) -> Self {
        Self {
            path: format!("updates/{}/{}", runtime_version, timestamp_ms),
            timestamp_ms,
        }
    }

    /// Repo-relative path of a file inside this bundle.
    pub fn file_path(&self, name: &str) -> String {
        format!("{}/{}", self.path, name)
    }
}

/// Storage backend for published update bundles.
#[async_trait]
pub trait UpdateStore: Send + Sync {
    /// Latest eligible bundle for a runtime version, by descending numeric
    /// timestamp. `channel` is accepted for forward compatibility; bundle
    /// layout is currently keyed by runtime version only.
    async fn latest_bundle(
        &self,
        runtime_version: &str,
        channel: &str,
    ) -> Result<BundleRef, StoreError>;

    /// Read a file inside a bundle directory.
    async fn read_file(&self, bundle: &BundleRef, name: &str) -> Result<Vec<u8>, StoreError>;

    /// Read a repo-relative path directly (asset refetch endpoint).
    async fn read_path(&self, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Creation time of the bundle's rollback marker, if one exists.
    async fn rollback_marker(
        &self,
        bundle: &BundleRef,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;
}

/// Pick the latest bundle directory among candidate names.
///
/// Largest numeric timestamp wins; equal timestamps (not expected in
/// practice) fall back to the lexicographically largest name so selection
/// stays stable across listings.
pub(crate) fn select_latest(dir_names: impl IntoIterator<Item = String>) -> Option<(String, i64)> {
    dir_names
        .into_iter()
        .filter_map(|name| name.parse::<i64>().ok().map(|ts| (name, ts)))
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
}
