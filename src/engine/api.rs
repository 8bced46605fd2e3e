//! HTTP API
//!
//! Protocol dispatcher: validates inbound requests, drives the
//! locate → classify → assemble → sign → envelope pipeline, and maps
//! outcomes and failures to wire responses.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::engine::assets::content_type_for_extension;
use crate::engine::error::ResolveError;
use crate::engine::manifest::{
    no_update_directive, resolve_update, Directive, Outcome, ResolveContext, UpdateManifest,
};
use crate::engine::multipart::{MultipartBody, Part};
use crate::engine::signing::{SignError, Signer};
use crate::engine::store::UpdateStore;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn UpdateStore>,
    pub signer: Arc<Signer>,
    /// The single platform this deployment serves.
    pub platform: String,
    /// Overrides the address derived from forwarding headers.
    pub public_url: Option<String>,
}

pub fn create_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/manifest", get(manifest_endpoint))
        .route("/api/assets", get(assets_endpoint))
        .route("/api/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Request-handling failures, split by the status they map to.
enum RequestError {
    /// Resolution failed: surfaced as 404 with the message exposed.
    Resolve(ResolveError),
    /// Signing misconfiguration: surfaced as 400.
    Signing(SignError),
    /// Payload serialization failed: surfaced as 500.
    Serialize(serde_json::Error),
}

impl From<ResolveError> for RequestError {
    fn from(e: ResolveError) -> Self {
        Self::Resolve(e)
    }
}

impl From<SignError> for RequestError {
    fn from(e: SignError) -> Self {
        Self::Signing(e)
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e)
    }
}

#[derive(Deserialize)]
pub struct ManifestQuery {
    platform: Option<String>,
    #[serde(rename = "runtime-version")]
    runtime_version: Option<String>,
    channel: Option<String>,
}

async fn manifest_endpoint(
    State(state): State<ApiState>,
    Query(query): Query<ManifestQuery>,
    headers: HeaderMap,
) -> Response {
    let protocol_version = {
        let mut values = headers.get_all("expo-protocol-version").iter();
        match (values.next(), values.next()) {
            (_, Some(_)) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "Unsupported protocol version. Expected either 0 or 1.",
                )
            }
            (None, None) => 0,
            (Some(value), None) => {
                match value.to_str().ok().and_then(|s| s.parse::<i32>().ok()) {
                    Some(v @ (0 | 1)) => v,
                    _ => {
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            "Unsupported protocol version. Expected either 0 or 1.",
                        )
                    }
                }
            }
        }
    };

    let platform = header_str(&headers, "expo-platform").or(query.platform.as_deref());
    if platform != Some(state.platform.as_str()) {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Unsupported platform. Expected \"{}\".", state.platform),
        );
    }

    let runtime_version =
        header_str(&headers, "expo-runtime-version").or(query.runtime_version.as_deref());
    let Some(runtime_version) = runtime_version.filter(|v| !v.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "No runtimeVersion provided.");
    };

    let channel = query.channel.as_deref().unwrap_or("production");
    let server_address = state
        .public_url
        .clone()
        .unwrap_or_else(|| derive_server_address(&headers));

    tracing::info!(runtime_version, channel, protocol_version, "manifest request");

    let ctx = ResolveContext {
        runtime_version,
        platform: &state.platform,
        protocol_version,
        current_update_id: header_str(&headers, "expo-current-update-id"),
        embedded_update_id: header_str(&headers, "expo-embedded-update-id"),
        server_address: &server_address,
    };
    let expect_signature = headers.get("expo-expect-signature").is_some();

    match handle_manifest_request(&state, &ctx, channel, expect_signature).await {
        Ok(response) => response,
        Err(RequestError::Signing(e)) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(RequestError::Resolve(e)) => {
            tracing::warn!(error = %e, "error finding update");
            error_response(StatusCode::NOT_FOUND, e.to_string())
        }
        Err(RequestError::Serialize(e)) => {
            tracing::error!(error = %e, "failed to serialize response payload");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
        }
    }
}

async fn handle_manifest_request(
    state: &ApiState,
    ctx: &ResolveContext<'_>,
    channel: &str,
    expect_signature: bool,
) -> Result<Response, RequestError> {
    let bundle = state
        .store
        .latest_bundle(ctx.runtime_version, channel)
        .await
        .map_err(ResolveError::from)?;

    match resolve_update(state.store.as_ref(), &bundle, ctx).await? {
        Outcome::Manifest(manifest) => {
            tracing::info!(bundle = %bundle.path, "found normal update, sending manifest");
            manifest_response(&state.signer, &manifest, ctx.protocol_version, expect_signature)
        }
        Outcome::RollBack(directive) => {
            tracing::info!(bundle = %bundle.path, "found rollback, sending directive");
            directive_response(&state.signer, &directive, expect_signature)
        }
        Outcome::NoUpdateAvailable => {
            tracing::info!("client is up to date, sending NoUpdateAvailable directive");
            let directive = no_update_directive(ctx.protocol_version)?;
            directive_response(&state.signer, &directive, expect_signature)
        }
    }
}

fn manifest_response(
    signer: &Signer,
    manifest: &UpdateManifest,
    protocol_version: i32,
    expect_signature: bool,
) -> Result<Response, RequestError> {
    // the signature covers these exact bytes; serialize once and reuse
    let manifest_json = serde_json::to_string(manifest)?;
    let signature = signer.maybe_sign(&manifest_json, expect_signature)?;

    // a fixed header bag per asset key, launch asset included, so clients
    // can apply fetch headers without re-deriving them
    let mut asset_request_headers = serde_json::Map::new();
    for asset in manifest
        .assets
        .iter()
        .chain(std::iter::once(&manifest.launch_asset))
    {
        asset_request_headers.insert(
            asset.key.clone(),
            json!({ "test-header": "test-header-value" }),
        );
    }
    let extensions_json = json!({ "assetRequestHeaders": asset_request_headers }).to_string();

    let mut body = MultipartBody::new();
    let mut manifest_part =
        Part::new("manifest", "application/json; charset=utf-8", manifest_json);
    if let Some(signature) = signature {
        manifest_part = manifest_part.with_header("expo-signature", signature);
    }
    body.push(manifest_part);
    body.push(Part::new("extensions", "application/json", extensions_json));

    Ok(envelope_response(body, protocol_version))
}

fn directive_response(
    signer: &Signer,
    directive: &Directive,
    expect_signature: bool,
) -> Result<Response, RequestError> {
    let directive_json = serde_json::to_string(directive)?;
    let signature = signer.maybe_sign(&directive_json, expect_signature)?;

    let mut body = MultipartBody::new();
    let mut part = Part::new("directive", "application/json; charset=utf-8", directive_json);
    if let Some(signature) = signature {
        part = part.with_header("expo-signature", signature);
    }
    body.push(part);

    // directives only exist on protocol version 1
    Ok(envelope_response(body, 1))
}

fn envelope_response(body: MultipartBody, protocol_version: i32) -> Response {
    let headers = [
        ("expo-protocol-version", protocol_version.to_string()),
        ("expo-sfv-version", "0".to_string()),
        ("cache-control", "private, max-age=0".to_string()),
        ("content-type", body.content_type_header()),
    ];
    (StatusCode::OK, headers, body.to_bytes()).into_response()
}

#[derive(Deserialize)]
pub struct AssetsQuery {
    asset: Option<String>,
    platform: Option<String>,
    #[serde(rename = "runtimeVersion")]
    #[allow(dead_code)]
    runtime_version: Option<String>,
}

async fn assets_endpoint(
    State(state): State<ApiState>,
    Query(query): Query<AssetsQuery>,
) -> Response {
    let Some(asset) = query.asset.filter(|a| !a.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "No asset name provided.");
    };
    if query.platform.as_deref().filter(|p| !p.is_empty()).is_none() {
        return error_response(StatusCode::BAD_REQUEST, "No platform provided.");
    }

    let asset_path = match STANDARD
        .decode(&asset)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
    {
        Some(path) => path,
        None => return error_response(StatusCode::BAD_REQUEST, "Invalid asset name."),
    };

    let extension = asset_path.rsplit('.').next().unwrap_or_default();
    let content_type = if extension == "bundle" {
        "application/javascript"
    } else {
        content_type_for_extension(extension)
    };

    match state.store.read_path(&asset_path).await {
        Ok(bytes) => ([("content-type", content_type)], bytes).into_response(),
        Err(e) => {
            tracing::warn!(asset = %asset_path, error = %e, "asset fetch failed");
            error_response(StatusCode::NOT_FOUND, e.to_string())
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn derive_server_address(headers: &HeaderMap) -> String {
    let proto = header_str(headers, "x-forwarded-proto").unwrap_or("http");
    let host = header_str(headers, "host").unwrap_or("localhost");
    format!("{}://{}", proto, host)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}
