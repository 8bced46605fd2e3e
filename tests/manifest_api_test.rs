mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::*;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::EncodePrivateKey;
use rsa::sha2::Sha256;
use rsa::signature::Verifier;
use rsa::RsaPrivateKey;
use serde_json::Value;
use tempfile::tempdir;
use tower::ServiceExt;
use updraft_lib::Signer;

fn manifest_request() -> axum::http::request::Builder {
    Request::builder()
        .uri("/api/manifest")
        .header("expo-platform", "android")
        .header("expo-runtime-version", "1.0.0")
}

async fn send(
    router: axum::Router,
    request: Request<Body>,
) -> (StatusCode, String, Vec<u8>) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, content_type, bytes)
}

#[tokio::test]
async fn latest_bundle_manifest() {
    let root = tempdir().unwrap();
    write_bundle(root.path(), "1.0.0", 100, false);
    write_bundle(root.path(), "1.0.0", 200, false);

    let request = manifest_request()
        .header("expo-protocol-version", "1")
        .body(Body::empty())
        .unwrap();
    let response = test_router(root.path()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["expo-protocol-version"], "1");
    assert_eq!(response.headers()["expo-sfv-version"], "0");
    assert_eq!(response.headers()["cache-control"], "private, max-age=0");

    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("multipart/mixed; boundary="));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parts = parse_multipart(&content_type, &bytes);
    assert_eq!(parts.len(), 2);

    let manifest_part = parts.iter().find(|p| p.name == "manifest").unwrap();
    assert_eq!(
        manifest_part.headers["content-type"],
        "application/json; charset=utf-8"
    );
    assert!(!manifest_part.headers.contains_key("expo-signature"));

    let manifest: Value = serde_json::from_str(&manifest_part.body).unwrap();
    // the latest bundle (timestamp 200) wins
    assert_eq!(manifest["id"], expected_update_id());
    assert_eq!(manifest["createdAt"], "1970-01-01T00:00:00.200Z");
    assert_eq!(manifest["runtimeVersion"], "1.0.0");
    assert_eq!(manifest["metadata"], serde_json::json!({}));
    assert_eq!(
        manifest["launchAsset"]["contentType"],
        "application/javascript"
    );
    assert_eq!(manifest["launchAsset"]["fileExtension"], ".bundle");
    assert!(manifest["launchAsset"]["url"]
        .as_str()
        .unwrap()
        .starts_with("http://localhost:3000/api/assets?asset="));

    let assets = manifest["assets"].as_array().unwrap();
    assert_eq!(assets.len(), 2);
    assert_eq!(assets[0]["fileExtension"], ".png");
    assert_eq!(assets[0]["contentType"], "image/png");
    assert_eq!(assets[1]["fileExtension"], ".jpg");

    assert_eq!(manifest["extra"]["expoClient"]["name"], "demo-app");
    assert_eq!(manifest["extra"]["expoClient"]["channel"], "production");

    // the extensions part maps every asset key, launch asset included
    let extensions_part = parts.iter().find(|p| p.name == "extensions").unwrap();
    assert_eq!(extensions_part.headers["content-type"], "application/json");
    let extensions: Value = serde_json::from_str(&extensions_part.body).unwrap();
    let request_headers = extensions["assetRequestHeaders"].as_object().unwrap();
    assert_eq!(request_headers.len(), 3);
    let launch_key = manifest["launchAsset"]["key"].as_str().unwrap();
    assert_eq!(
        request_headers[launch_key]["test-header"],
        "test-header-value"
    );
}

#[tokio::test]
async fn current_client_gets_no_update_directive() {
    let root = tempdir().unwrap();
    write_bundle(root.path(), "1.0.0", 200, false);

    let request = manifest_request()
        .header("expo-protocol-version", "1")
        .header("expo-current-update-id", expected_update_id())
        .body(Body::empty())
        .unwrap();
    let (status, content_type, bytes) = send(test_router(root.path()), request).await;

    assert_eq!(status, StatusCode::OK);
    let parts = parse_multipart(&content_type, &bytes);
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].name, "directive");
    let directive: Value = serde_json::from_str(&parts[0].body).unwrap();
    assert_eq!(directive["type"], "noUpdateAvailable");
}

#[tokio::test]
async fn protocol_version_defaults_to_zero_and_skips_no_update() {
    let root = tempdir().unwrap();
    write_bundle(root.path(), "1.0.0", 200, false);

    // same current-update-id, but no protocol header: version 0 clients
    // always get a manifest
    let request = manifest_request()
        .header("expo-current-update-id", expected_update_id())
        .body(Body::empty())
        .unwrap();
    let response = test_router(root.path()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["expo-protocol-version"], "0");
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parts = parse_multipart(&content_type, &bytes);
    assert!(parts.iter().any(|p| p.name == "manifest"));
}

#[tokio::test]
async fn rollback_bundle_sends_directive() {
    let root = tempdir().unwrap();
    write_bundle(root.path(), "1.0.0", 200, true);

    let request = manifest_request()
        .header("expo-protocol-version", "1")
        .header("expo-embedded-update-id", "embedded-id")
        .header("expo-current-update-id", "something-else")
        .body(Body::empty())
        .unwrap();
    let (status, content_type, bytes) = send(test_router(root.path()), request).await;

    assert_eq!(status, StatusCode::OK);
    let parts = parse_multipart(&content_type, &bytes);
    assert_eq!(parts.len(), 1);
    let directive: Value = serde_json::from_str(&parts[0].body).unwrap();
    assert_eq!(directive["type"], "rollBackToEmbedded");
    let commit_time = directive["parameters"]["commitTime"].as_str().unwrap();
    chrono::DateTime::parse_from_rfc3339(commit_time).unwrap();
}

#[tokio::test]
async fn rollback_matching_embedded_id_is_no_update() {
    let root = tempdir().unwrap();
    write_bundle(root.path(), "1.0.0", 200, true);

    let request = manifest_request()
        .header("expo-protocol-version", "1")
        .header("expo-embedded-update-id", "embedded-id")
        .header("expo-current-update-id", "embedded-id")
        .body(Body::empty())
        .unwrap();
    let (status, content_type, bytes) = send(test_router(root.path()), request).await;

    assert_eq!(status, StatusCode::OK);
    let parts = parse_multipart(&content_type, &bytes);
    let directive: Value = serde_json::from_str(&parts[0].body).unwrap();
    assert_eq!(directive["type"], "noUpdateAvailable");
}

#[tokio::test]
async fn rollback_fails_on_protocol_zero() {
    let root = tempdir().unwrap();
    write_bundle(root.path(), "1.0.0", 200, true);

    let request = manifest_request()
        .header("expo-embedded-update-id", "embedded-id")
        .body(Body::empty())
        .unwrap();
    let (status, _, bytes) = send(test_router(root.path()), request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        error["error"],
        "Rollbacks not supported on protocol version 0"
    );
}

#[tokio::test]
async fn unknown_runtime_version_is_404() {
    let root = tempdir().unwrap();
    write_bundle(root.path(), "1.0.0", 200, false);

    let request = Request::builder()
        .uri("/api/manifest")
        .header("expo-platform", "android")
        .header("expo-runtime-version", "9.9.9")
        .body(Body::empty())
        .unwrap();
    let (status, _, bytes) = send(test_router(root.path()), request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        error["error"],
        "No updates found for runtime version: 9.9.9"
    );
}

#[tokio::test]
async fn validation_errors_are_400() {
    let root = tempdir().unwrap();
    write_bundle(root.path(), "1.0.0", 200, false);
    let router = test_router(root.path());

    // wrong platform
    let request = Request::builder()
        .uri("/api/manifest?platform=ios&runtime-version=1.0.0")
        .body(Body::empty())
        .unwrap();
    let (status, _, bytes) = send(router.clone(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(error["error"], "Unsupported platform. Expected \"android\".");

    // missing runtime version
    let request = Request::builder()
        .uri("/api/manifest?platform=android")
        .body(Body::empty())
        .unwrap();
    let (status, _, bytes) = send(router.clone(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(error["error"], "No runtimeVersion provided.");

    // unparseable protocol version
    let request = manifest_request()
        .header("expo-protocol-version", "2")
        .body(Body::empty())
        .unwrap();
    let (status, _, bytes) = send(router.clone(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        error["error"],
        "Unsupported protocol version. Expected either 0 or 1."
    );
}

#[tokio::test]
async fn non_get_method_is_405() {
    let root = tempdir().unwrap();
    write_bundle(root.path(), "1.0.0", 200, false);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/manifest")
        .body(Body::empty())
        .unwrap();
    let response = test_router(root.path()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn query_parameters_work_in_place_of_headers() {
    let root = tempdir().unwrap();
    write_bundle(root.path(), "1.0.0", 200, false);

    let request = Request::builder()
        .uri("/api/manifest?platform=android&runtime-version=1.0.0&channel=staging")
        .body(Body::empty())
        .unwrap();
    let (status, content_type, bytes) = send(test_router(root.path()), request).await;

    assert_eq!(status, StatusCode::OK);
    let parts = parse_multipart(&content_type, &bytes);
    assert!(parts.iter().any(|p| p.name == "manifest"));
}

#[tokio::test]
async fn signature_requested_and_verifiable() {
    let root = tempdir().unwrap();
    write_bundle(root.path(), "1.0.0", 200, false);

    let mut rng = rand::thread_rng();
    let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
    let verifying_key = VerifyingKey::<Sha256>::new(key.to_public_key());
    let pem = key.to_pkcs8_pem(rsa::pkcs8::LineEnding::LF).unwrap();

    let router = router_with_signer(root.path(), Signer::from_pem(&pem).unwrap());
    let request = manifest_request()
        .header("expo-protocol-version", "1")
        .header("expo-expect-signature", "true")
        .body(Body::empty())
        .unwrap();
    let (status, content_type, bytes) = send(router, request).await;

    assert_eq!(status, StatusCode::OK);
    let parts = parse_multipart(&content_type, &bytes);
    let manifest_part = parts.iter().find(|p| p.name == "manifest").unwrap();

    let dictionary = &manifest_part.headers["expo-signature"];
    assert!(dictionary.contains("keyid=\"main\""));
    let encoded = dictionary
        .split("sig=\"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .unwrap();
    let raw = STANDARD.decode(encoded).unwrap();
    let signature = Signature::try_from(raw.as_slice()).unwrap();

    // the signature covers the exact bytes of the transmitted part
    verifying_key
        .verify(manifest_part.body.as_bytes(), &signature)
        .unwrap();

    // the extensions part is never signed
    let extensions_part = parts.iter().find(|p| p.name == "extensions").unwrap();
    assert!(!extensions_part.headers.contains_key("expo-signature"));
}

#[tokio::test]
async fn signature_requested_without_key_is_400() {
    let root = tempdir().unwrap();
    write_bundle(root.path(), "1.0.0", 200, false);

    let request = manifest_request()
        .header("expo-expect-signature", "true")
        .body(Body::empty())
        .unwrap();
    let (status, _, bytes) = send(test_router(root.path()), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        error["error"],
        "Code signing requested but no key supplied when starting server."
    );
}

#[tokio::test]
async fn signature_not_requested_means_no_signature_header() {
    let root = tempdir().unwrap();
    write_bundle(root.path(), "1.0.0", 200, false);

    let mut rng = rand::thread_rng();
    let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
    let pem = key.to_pkcs8_pem(rsa::pkcs8::LineEnding::LF).unwrap();
    let router = router_with_signer(root.path(), Signer::from_pem(&pem).unwrap());

    let request = manifest_request().body(Body::empty()).unwrap();
    let (status, content_type, bytes) = send(router, request).await;

    assert_eq!(status, StatusCode::OK);
    let parts = parse_multipart(&content_type, &bytes);
    for part in &parts {
        assert!(!part.headers.contains_key("expo-signature"));
    }
}

#[tokio::test]
async fn health_endpoint() {
    let root = tempdir().unwrap();
    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let (status, _, bytes) = send(test_router(root.path()), request).await;

    assert_eq!(status, StatusCode::OK);
    let health: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health["status"], "ok");
}
