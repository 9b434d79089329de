//! REST API endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/health` | Liveness and uptime |
//! | `GET` | `/api/sessions` | Live view bindings |
//! | `GET` | `/api/caches` | Entry count per cache namespace |
//! | `GET` | `/api/views/{id}/vbos` | Latest buffers dispatched for a view |
//! | `POST` | `/api/views/{id}/snapshots` | Publish a view's latest buffers |
//! | `PUT` | `/api/snapshots/{id}/preview` | Upload a PNG thumbnail for a snapshot |

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use vizsession_publish::SnapshotContent;
use vizsession_types::{RenderConfig, SnapshotId, ViewId};

use crate::error::ApiError;
use crate::state::AppState;

/// Body of `POST /api/views/{id}/snapshots`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    /// Snapshot name. Defaults to `{view}-{step}`.
    pub snapshot_id: Option<String>,
}

/// Query of `PUT /api/snapshots/{id}/preview`.
#[derive(Debug, Default, Deserialize)]
pub struct PreviewQuery {
    /// Image file name. Defaults to `preview.png`.
    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// GET /
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page with live counters and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let connected = state.connected();
    let opened = state.opened();
    let bound = state.sessions.bindings.len();
    let rows: String = state
        .caches()
        .stats()
        .await
        .iter()
        .map(|stats| {
            format!(
                "<li><code>{}</code>: {}</li>",
                stats.namespace.as_str(),
                stats.entry_count
            )
        })
        .collect();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Vizsession</title>
    <style>
        body {{ background: #0d1117; color: #c9d1d9; font-family: monospace; padding: 2rem; }}
        h1 {{ color: #58a6ff; }}
        a {{ color: #58a6ff; }}
    </style>
</head>
<body>
    <h1>Vizsession</h1>
    <p>Sockets open: {connected} (opened since start: {opened})</p>
    <p>Views bound: {bound}</p>
    <h2>Caches</h2>
    <ul>{rows}</ul>
    <h2>API</h2>
    <ul>
        <li><a href="/api/health">/api/health</a></li>
        <li><a href="/api/sessions">/api/sessions</a></li>
        <li><a href="/api/caches">/api/caches</a></li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/health
// ---------------------------------------------------------------------------

/// Liveness probe.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let uptime = Utc::now()
        .signed_duration_since(state.started_at)
        .num_seconds();
    Json(json!({
        "status": "ok",
        "uptimeSeconds": uptime,
        "connected": state.connected(),
    }))
}

// ---------------------------------------------------------------------------
// GET /api/sessions
// ---------------------------------------------------------------------------

/// List live view bindings.
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.sessions.bindings.active())
}

// ---------------------------------------------------------------------------
// GET /api/caches
// ---------------------------------------------------------------------------

/// Entry count of every cache namespace.
pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<Value> {
    let namespaces: Vec<Value> = state
        .caches()
        .stats()
        .await
        .iter()
        .map(|stats| json!({ "namespace": stats.namespace.as_str(), "entries": stats.entry_count }))
        .collect();
    Json(json!({ "namespaces": namespaces }))
}

// ---------------------------------------------------------------------------
// GET /api/views/{id}/vbos
// ---------------------------------------------------------------------------

/// Describe the latest buffers dispatched for a view.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] when no tick has been dispatched for the
/// view, or its entry has been evicted.
pub async fn get_vbos(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let view_id = ViewId::new(id);
    let vbos = state
        .caches()
        .vbos
        .get(&view_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("no buffers cached for view {view_id}")))?;

    Ok(Json(json!({
        "viewId": vbos.view_id,
        "step": vbos.step,
        "elements": vbos.elements,
        "bufferByteLengths": vbos.buffer_byte_lengths(),
        "capturedAt": vbos.captured_at,
    })))
}

// ---------------------------------------------------------------------------
// POST /api/views/{id}/snapshots
// ---------------------------------------------------------------------------

/// Publish a view's latest buffers as a snapshot.
///
/// Responds `200` with the publish report, or `207` with uploaded and
/// failed counts when some buffers failed.
///
/// # Errors
///
/// [`ApiError::NotFound`] when nothing is cached for the view,
/// [`ApiError::BadRequest`] for an unusable snapshot name,
/// [`ApiError::PartialFailure`] and [`ApiError::Upstream`] when the
/// upload fails.
pub async fn publish_snapshot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<PublishRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let view_id = ViewId::new(id);
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let caches = state.caches();

    let vbos = caches
        .vbos
        .get(&view_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("no buffers cached for view {view_id}")))?;
    let render_config = caches
        .n_bodies_by_id
        .get(&view_id)
        .await
        .map_or_else(RenderConfig::default, |simulation| simulation.render_config());

    let snapshot_id = SnapshotId::new(
        request
            .snapshot_id
            .unwrap_or_else(|| format!("{view_id}-{}", vbos.step)),
    );
    let content = SnapshotContent::from_vbos(&vbos, render_config);
    let report = state.publisher.publish(&snapshot_id, &content).await?;

    info!(view_id = %view_id, snapshot_id = %snapshot_id, uploaded = report.uploaded, "Snapshot exported");
    Ok(Json(report))
}

// ---------------------------------------------------------------------------
// PUT /api/snapshots/{id}/preview
// ---------------------------------------------------------------------------

/// Upload a PNG thumbnail next to a published snapshot.
///
/// # Errors
///
/// [`ApiError::BadRequest`] for an empty body or an unusable name,
/// [`ApiError::Upstream`] when the upload fails.
pub async fn publish_preview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<PreviewQuery>,
    png: Bytes,
) -> Result<Json<Value>, ApiError> {
    if png.is_empty() {
        return Err(ApiError::BadRequest(String::from("empty preview image")));
    }
    let snapshot_id = SnapshotId::new(id);
    let path = state
        .publisher
        .publish_preview(&snapshot_id, query.name.as_deref(), &png)
        .await?;

    info!(snapshot_id = %snapshot_id, path = %path, bytes = png.len(), "Snapshot preview uploaded");
    Ok(Json(json!({ "snapshotId": snapshot_id, "path": path })))
}
