//! Shared fixtures for the API integration tests.

#![allow(dead_code)]

use axum::Router;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use updraft_lib::engine::hashing::{sha256_hash_to_uuid, sha256_hex};
use updraft_lib::{create_router, ApiState, LocalStore, Signer};

pub const METADATA: &str = r#"{
    "version": 0,
    "bundler": "metro",
    "fileMetadata": {
        "android": {
            "bundle": "bundles/android-main.js",
            "assets": [
                {"path": "assets/icon", "ext": "png"},
                {"path": "assets/splash", "ext": "jpg"}
            ]
        }
    },
    "channel": "production"
}"#;

pub const EXPO_CONFIG: &str = r#"{"name":"demo-app","slug":"demo-app","sdkVersion":"50.0.0"}"#;

pub const LAUNCH_ASSET: &[u8] = b"var app = function () { return 1; };";
pub const ICON_ASSET: &[u8] = b"png-icon-bytes";
pub const SPLASH_ASSET: &[u8] = b"jpg-splash-bytes";

/// Lay out one published bundle under `root/updates/<runtime>/<timestamp>/`.
pub fn write_bundle(root: &Path, runtime: &str, timestamp: u64, rollback: bool) {
    let dir = root
        .join("updates")
        .join(runtime)
        .join(timestamp.to_string());
    fs::create_dir_all(dir.join("bundles")).unwrap();
    fs::create_dir_all(dir.join("assets")).unwrap();
    fs::write(dir.join("metadata.json"), METADATA).unwrap();
    fs::write(dir.join("expoConfig.json"), EXPO_CONFIG).unwrap();
    fs::write(dir.join("bundles/android-main.js"), LAUNCH_ASSET).unwrap();
    fs::write(dir.join("assets/icon"), ICON_ASSET).unwrap();
    fs::write(dir.join("assets/splash"), SPLASH_ASSET).unwrap();
    if rollback {
        fs::write(dir.join("rollback"), "").unwrap();
    }
}

/// The wire-form update id for the fixture metadata.
pub fn expected_update_id() -> String {
    sha256_hash_to_uuid(&sha256_hex(METADATA.as_bytes())).unwrap()
}

pub fn test_router(root: &Path) -> Router {
    router_with_signer(root, Signer::unsigned())
}

pub fn router_with_signer(root: &Path, signer: Signer) -> Router {
    create_router(ApiState {
        store: Arc::new(LocalStore::new(root)),
        signer: Arc::new(signer),
        platform: "android".to_string(),
        public_url: Some("http://localhost:3000".to_string()),
    })
}

/// One parsed part of a multipart response body.
pub struct MultipartPart {
    pub name: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// Minimal multipart/mixed parser for assertions.
pub fn parse_multipart(content_type: &str, body: &[u8]) -> Vec<MultipartPart> {
    let boundary = content_type
        .split("boundary=")
        .nth(1)
        .expect("boundary in content-type");
    let text = String::from_utf8(body.to_vec()).expect("utf8 multipart body");
    let delimiter = format!("--{}", boundary);

    let mut parts = Vec::new();
    for segment in text.split(&delimiter) {
        let segment = segment.strip_prefix("\r\n").unwrap_or(segment);
        if segment.is_empty() || segment.starts_with("--") {
            continue;
        }
        let (header_block, part_body) = segment
            .split_once("\r\n\r\n")
            .expect("part headers and body");

        let mut headers = HashMap::new();
        let mut name = String::new();
        for line in header_block.split("\r\n") {
            if let Some((key, value)) = line.split_once(": ") {
                if key.eq_ignore_ascii_case("content-disposition") {
                    if let Some(n) = value
                        .split("name=\"")
                        .nth(1)
                        .and_then(|rest| rest.split('"').next())
                    {
                        name = n.to_string();
                    }
                }
                headers.insert(key.to_ascii_lowercase(), value.to_string());
            }
        }

        parts.push(MultipartPart {
            name,
            headers,
            body: part_body.trim_end_matches("\r\n").to_string(),
        });
    }
    parts
}
