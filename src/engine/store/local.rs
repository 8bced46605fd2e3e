//! Local Filesystem Store
//!
//! Serves update bundles from a directory tree on disk, rooted at the
//! directory that contains `updates/`.

use super::{select_latest, BundleRef, StoreError, UpdateStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a repo-relative path under the store root, rejecting
    /// anything that could escape it.
    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path);
        let escapes = relative.components().any(|c| {
            matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
        });
        if escapes {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    async fn read_resolved(&self, repo_path: &str) -> Result<Vec<u8>, StoreError> {
        let full = self.resolve(repo_path)?;
        tokio::fs::read(&full).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::FileNotFound(repo_path.to_string())
            } else {
                StoreError::Io {
                    path: repo_path.to_string(),
                    source: e,
                }
            }
        })
    }
}

#[async_trait]
impl UpdateStore for LocalStore {
    async fn latest_bundle(
        &self,
        runtime_version: &str,
        _channel: &str,
    ) -> Result<BundleRef, StoreError> {
        let dir = self.root.join("updates").join(runtime_version);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(_) => return Err(StoreError::RuntimeVersionNotFound(runtime_version.to_string())),
        };

        let mut names = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if is_dir {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }

        match select_latest(names) {
            Some((_, timestamp_ms)) => Ok(BundleRef::new(runtime_version, timestamp_ms)),
            None => Err(StoreError::RuntimeVersionNotFound(runtime_version.to_string())),
        }
    }

    async fn read_file(&self, bundle: &BundleRef, name: &str) -> Result<Vec<u8>, StoreError> {
        self.read_resolved(&bundle.file_path(name)).await
    }

    async fn read_path(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.read_resolved(path).await
    }

    async fn rollback_marker(
        &self,
        bundle: &BundleRef,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let marker = self.resolve(&bundle.file_path("rollback"))?;
        match tokio::fs::metadata(&marker).await {
            Ok(meta) => {
                let modified = meta.modified().map_err(|e| StoreError::Io {
                    path: bundle.file_path("rollback"),
                    source: e,
                })?;
                Ok(Some(DateTime::<Utc>::from(modified)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io {
                path: bundle.file_path("rollback"),
                source: e,
            }),
        }
    }
}
