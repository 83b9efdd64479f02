pub mod api;
pub mod ws;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Full application router: REST plus WebSocket endpoints
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(api::create_api_router())
        .merge(ws::create_ws_router())
        .layer(CorsLayer::permissive())
}
