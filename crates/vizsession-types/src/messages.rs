//! Connection options and wire messages exchanged with viewers.
//!
//! All messages are JSON objects tagged with a `type` field. Outbound
//! state changes are [`Delta`]s: lists of path-addressed values, where each
//! path names the changed sub-tree of the viewer's document (for example
//! `workbooks.open.views.current.scene.points.elements`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::documents::{RenderConfig, View};
use crate::ids::{DatasetId, SessionId, ViewId, WorkbookId};

/// Document fragment paths published by the update dispatcher.
pub mod paths {
    /// Number of expression templates on the current view.
    pub const EXPRESSION_TEMPLATES_LENGTH: &str =
        "workbooks.open.views.current.expressionTemplates.length";
    /// Point element count of the current scene.
    pub const SCENE_POINTS_ELEMENTS: &str = "workbooks.open.views.current.scene.points.elements";
    /// Edge element count of the current scene.
    pub const SCENE_EDGES_ELEMENTS: &str = "workbooks.open.views.current.scene.edges.elements";
    /// Layout step of the current view's simulation.
    pub const SIMULATION_STEP: &str = "workbooks.open.views.current.simulation.step";
}

/// Query parameters supplied when a viewer connects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    /// Workbook to open. Required.
    pub workbook: Option<WorkbookId>,
    /// View to open; the workbook's current view when absent.
    pub view: Option<ViewId>,
    /// Dataset hint.
    pub dataset: Option<DatasetId>,
    /// Client-supplied debug correlation id.
    pub debug_id: Option<String>,
    /// Client-supplied user tag.
    pub usertag: Option<String>,
    /// Every other query parameter.
    pub extra: BTreeMap<String, String>,
}

impl ConnectOptions {
    /// Build options from raw query parameters.
    ///
    /// Empty values are treated as absent.
    pub fn from_query(query: BTreeMap<String, String>) -> Self {
        let mut options = Self::default();
        for (key, value) in query {
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "workbook" => options.workbook = Some(WorkbookId(value)),
                "view" => options.view = Some(ViewId(value)),
                "dataset" => options.dataset = Some(DatasetId(value)),
                "debugId" => options.debug_id = Some(value),
                "usertag" => options.usertag = Some(value),
                _ => {
                    options.extra.insert(key, value);
                }
            }
        }
        options
    }
}

/// A message sent by a viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// An interaction fed into the view's simulation.
    Interact {
        /// The interaction.
        interaction: Interaction,
    },
    /// Liveness probe; answered with [`ServerMessage::Pong`].
    Ping,
}

/// A viewer interaction with the layout simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interaction {
    /// Stop stepping the layout.
    Pause,
    /// Continue stepping the layout.
    Resume,
    /// Move one point by an offset.
    Nudge {
        /// Point index.
        point: u32,
        /// Horizontal offset.
        dx: f32,
        /// Vertical offset.
        dy: f32,
    },
    /// Change the layout tick interval.
    SetTickInterval {
        /// New interval in milliseconds.
        ms: u64,
    },
}

/// A message sent to a viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The renderer was seeded with the full current state.
    Seeded {
        /// The session that was seeded.
        session_id: SessionId,
        /// The workbook that was opened.
        workbook_id: WorkbookId,
        /// The opened view.
        view: View,
        /// Renderer settings.
        render_config: RenderConfig,
        /// Simulation step the seed was taken at.
        step: u64,
    },
    /// An incremental state change.
    Delta(Delta),
    /// A fatal session error, sent right before the connection closes.
    Error {
        /// Error category.
        kind: ErrorKind,
        /// Human-readable description.
        message: String,
    },
    /// The session is closing.
    Closed {
        /// Why it closed.
        reason: CloseReason,
    },
    /// Answer to [`ClientMessage::Ping`].
    Pong,
}

/// Path-addressed state changes for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Delta {
    /// The view the changes apply to.
    pub view_id: ViewId,
    /// Simulation step the changes were computed at.
    pub step: u64,
    /// Changed values, one per document fragment path.
    pub paths: Vec<PathValue>,
}

/// One changed value at a document fragment path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PathValue {
    /// Dotted document fragment path.
    pub path: String,
    /// New value.
    pub value: serde_json::Value,
}

/// Category of a fatal session error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No workbook id was supplied.
    MissingWorkbook,
    /// The workbook or view does not exist.
    NotFound,
    /// The backing store could not be reached.
    StoreError,
    /// The layout simulation could not be created.
    Simulation,
    /// The socket failed.
    TransportError,
    /// A newer session took over the view.
    Superseded,
}

/// Why a session closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The viewer disconnected.
    ClientDisconnected,
    /// A newer session took over the view.
    Superseded,
    /// The session hit a fatal error.
    Error,
    /// The view's tick stream ended.
    SimulationEnded,
}
