//! HTTP API and WebSocket transport for the visualization session
//! orchestrator.
//!
//! This crate provides an Axum server that exposes:
//!
//! - **`WebSocket` endpoint** (`/socket`) where each connection runs one
//!   [`Session`](vizsession_core::Session)
//! - **REST endpoints** for operators: health, live view bindings, cache
//!   namespace sizes, and the latest buffers per view
//! - **Snapshot export** (`POST /api/views/{id}/snapshots`) publishing a
//!   view's cached buffers through the staged publisher
//! - **Minimal HTML status page** (`GET /`)

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use startup::spawn_server;
pub use state::AppState;
