//! WebSocket router.
//!
//! Both endpoints are intentionally unauthenticated: the media stream is
//! driven by the telephony bridge inside the deployment boundary, and
//! observer delivery is best-effort. Protect them at the proxy layer if the
//! server is exposed directly.

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::ws;
use crate::state::AppState;

/// Create the WebSocket router
pub fn create_ws_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws/media", get(ws::ws_media_handler))
        .route("/ws/observe", get(ws::ws_observe_handler))
        .layer(TraceLayer::new_for_http())
}
