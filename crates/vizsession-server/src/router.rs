//! Axum router construction.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete router.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /socket` -- `WebSocket` session transport
/// - `GET /api/health` -- liveness
/// - `GET /api/sessions` -- live view bindings
/// - `GET /api/caches` -- cache namespace sizes
/// - `GET /api/views/{id}/vbos` -- latest buffers for a view
/// - `POST /api/views/{id}/snapshots` -- publish a view's buffers
/// - `PUT /api/snapshots/{id}/preview` -- upload a snapshot thumbnail
///
/// CORS allows any origin so viewers served from another host can connect.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/socket", get(ws::socket))
        .route("/api/health", get(handlers::health))
        .route("/api/sessions", get(handlers::list_sessions))
        .route("/api/caches", get(handlers::cache_stats))
        .route("/api/views/{id}/vbos", get(handlers::get_vbos))
        .route("/api/views/{id}/snapshots", post(handlers::publish_snapshot))
        .route("/api/snapshots/{id}/preview", put(handlers::publish_preview))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
