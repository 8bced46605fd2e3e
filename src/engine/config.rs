//! Server Configuration
//!
//! Assembled once at startup from CLI flags and environment variables,
//! then read-only for the life of the process.

use crate::engine::store::{GitHubStore, LocalStore, UpdateStore};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid GitHub repository \"{0}\": expected owner/name")]
    InvalidRepo(String),
}

/// Where published bundles are read from.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    Local {
        root: PathBuf,
    },
    GitHub {
        owner: String,
        repo: String,
        branch: String,
        token: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub platform: String,
    pub public_url: Option<String>,
    pub private_key_path: Option<PathBuf>,
    pub backend: StoreBackend,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn build_store(&self) -> Arc<dyn UpdateStore> {
        match &self.backend {
            StoreBackend::Local { root } => Arc::new(LocalStore::new(root.clone())),
            StoreBackend::GitHub {
                owner,
                repo,
                branch,
                token,
            } => Arc::new(GitHubStore::new(
                owner.clone(),
                repo.clone(),
                branch.clone(),
                token.clone(),
            )),
        }
    }
}

/// Split an `owner/name` repository selector.
pub fn parse_repo(value: &str) -> Result<(String, String), ConfigError> {
    match value.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner.to_string(), name.to_string()))
        }
        _ => Err(ConfigError::InvalidRepo(value.to_string())),
    }
}
