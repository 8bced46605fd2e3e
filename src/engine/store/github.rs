//! GitHub Repository Store
//!
//! Serves update bundles straight out of a GitHub repository: directory
//! listings and existence checks go through the contents API, raw bytes
//! come from raw.githubusercontent.com. An optional token lifts the
//! unauthenticated rate limit and allows private repositories.

use super::{select_latest, BundleRef, StoreError, UpdateStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL};
use reqwest::StatusCode;
use serde::Deserialize;

const GITHUB_API_URL: &str = "https://api.github.com";
const GITHUB_RAW_URL: &str = "https://raw.githubusercontent.com";

/// One entry of a contents-API directory listing.
#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    #[serde(rename = "type")]
    entry_type: String,
}

pub struct GitHubStore {
    owner: String,
    repo: String,
    branch: String,
    token: Option<String>,
    http_client: reqwest::Client,
}

impl GitHubStore {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent("updraft-server")
            .build()
            .unwrap_or_default();
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
            token,
            http_client,
        }
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            GITHUB_API_URL, self.owner, self.repo, path
        )
    }

    fn raw_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            GITHUB_RAW_URL, self.owner, self.repo, self.branch, path
        )
    }

    async fn api_get(&self, url: &str) -> Result<reqwest::Response, StoreError> {
        let mut request = self
            .http_client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("token {}", token));
        }
        Ok(request.send().await?)
    }

    async fn list_directories(&self, path: &str) -> Result<Vec<String>, StoreError> {
        let url = self.contents_url(path);
        let response = self.api_get(&url).await?;
        if !response.status().is_success() {
            return Err(StoreError::Api {
                status: response.status(),
                url,
            });
        }
        let entries: Vec<ContentEntry> = response.json().await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.entry_type == "dir")
            .map(|e| e.name)
            .collect())
    }
}

#[async_trait]
impl UpdateStore for GitHubStore {
    async fn latest_bundle(
        &self,
        runtime_version: &str,
        _channel: &str,
    ) -> Result<BundleRef, StoreError> {
        let names = match self
            .list_directories(&format!("updates/{}", runtime_version))
            .await
        {
            Ok(names) => names,
            // missing directory and listing failure alike mean "nothing
            // published for this runtime"
            Err(_) => {
                return Err(StoreError::RuntimeVersionNotFound(
                    runtime_version.to_string(),
                ))
            }
        };

        match select_latest(names) {
            Some((_, timestamp_ms)) => Ok(BundleRef::new(runtime_version, timestamp_ms)),
            None => Err(StoreError::RuntimeVersionNotFound(
                runtime_version.to_string(),
            )),
        }
    }

    async fn read_file(&self, bundle: &BundleRef, name: &str) -> Result<Vec<u8>, StoreError> {
        self.read_path(&bundle.file_path(name)).await
    }

    async fn read_path(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let url = self.raw_url(path);
        let response = self.http_client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(StoreError::FileNotFound(path.to_string()));
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn rollback_marker(
        &self,
        bundle: &BundleRef,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let url = self.contents_url(&bundle.file_path("rollback"));
        let response = self.api_get(&url).await?;
        match response.status() {
            status if status.is_success() => Ok(Some(Utc::now())),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(StoreError::Api { status, url }),
        }
    }
}
