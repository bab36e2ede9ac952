// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::config::AppConfig;
use crate::engine::ClientRegistry;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) registry: Arc<ClientRegistry>,
    pub(crate) config: AppConfig,
}

pub fn app(registry: Arc<ClientRegistry>, config: AppConfig) -> Router {
    let static_files = ServeDir::new(&config.server.static_dir);
    let state = AppState { registry, config };
    Router::new()
        .route("/ws", get(ws::ws_stats)) // WS /ws
        .route("/baseurl", get(http::baseurl_handler)) // GET /baseurl
        .route("/version", get(http::version_handler)) // GET /version
        .fallback_service(static_files) // GET /* (dashboard assets)
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
