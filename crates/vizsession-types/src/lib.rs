//! Shared type definitions for the visualization session orchestrator.
//!
//! This crate is the single source of truth for the documents, simulation
//! ticks, and wire messages exchanged between the cache, the loader, the
//! session pipeline, and connected viewers. Wire types flow downstream to
//! `TypeScript` via `ts-rs` for the viewer client.
//!
//! # Modules
//!
//! - [`ids`] -- Strongly-typed identifier wrappers
//! - [`documents`] -- Workbook, view, dataset, and scene documents
//! - [`tick`] -- Simulation ticks and captured VBO sets
//! - [`messages`] -- Connection options and client/server wire messages

pub mod documents;
pub mod ids;
pub mod messages;
pub mod tick;

// Re-export all public types at crate root for convenience.
pub use documents::{Dataset, RenderConfig, Scene, SceneElements, View, ViewList, Workbook};
pub use ids::{DatasetId, SessionId, SnapshotId, ViewId, WorkbookId};
pub use messages::{
    paths, ClientMessage, CloseReason, ConnectOptions, Delta, ErrorKind, Interaction, PathValue,
    ServerMessage,
};
pub use tick::{Tick, VboSet};
