// GET handlers: version, baseurl

use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;

/// Package name and version (from Cargo.toml at build time).
const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// GET /version: service name and version.
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /baseurl: the `Host` the dashboard reached us on, used to build its WebSocket URL.
pub(super) async fn baseurl_handler(headers: HeaderMap) -> impl IntoResponse {
    match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => (StatusCode::OK, host.to_string()),
        None => (StatusCode::BAD_REQUEST, "missing Host header".to_string()),
    }
}
