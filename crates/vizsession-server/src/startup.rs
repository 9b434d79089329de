//! Background startup helper for the worker binary.
//!
//! [`spawn_server`] binds the listener eagerly, so a port conflict is
//! reported to the caller instead of inside a detached task, then serves
//! on a background Tokio task.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::server::{ServerConfig, ServerError, serve};
use crate::state::AppState;

/// Bind `config`'s address and serve the API on a background task.
///
/// The returned handle resolves when the server stops; the caller should
/// await it (or abort it) during shutdown.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is invalid or already in
/// use.
pub async fn spawn_server(
    config: &ServerConfig,
    state: Arc<AppState>,
) -> Result<JoinHandle<Result<(), ServerError>>, ServerError> {
    let addr = config.addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    let handle = tokio::spawn(serve(listener, state));
    tracing::info!(%addr, "Server spawned on background task");
    Ok(handle)
}
