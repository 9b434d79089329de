//! Layout simulation interfaces.
//!
//! A [`SimulationEngine`] materializes the live layout process for a view.
//! The resulting [`Simulation`] handle is cached in `nBodiesById` and is
//! shared by every session that opens the view over time; only one
//! session is attached to it at any moment.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::broadcast;
use vizsession_cache::{ContentHash, Store};
use vizsession_types::{Dataset, Interaction, RenderConfig, SessionId, Tick, View, ViewId};

/// Shared handle to a live layout simulation.
pub type SimulationRef = Arc<dyn Simulation>;

/// Errors raised by simulation engines and handles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    /// The simulation could not be created.
    #[error("failed to create simulation for view {view_id}: {message}")]
    Create {
        /// The view.
        view_id: ViewId,
        /// What went wrong.
        message: String,
    },

    /// The dataset artifact could not be decoded.
    #[error("invalid dataset artifact {hash}: {message}")]
    InvalidArtifact {
        /// Content hash of the artifact.
        hash: String,
        /// Decoder message.
        message: String,
    },

    /// The simulation has stopped and accepts no more input.
    #[error("simulation for view {0} has stopped")]
    Stopped(ViewId),
}

/// Parameters handed to the engine when a simulation is created.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LayoutConfig {
    /// Real-time milliseconds between layout steps.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Capacity of the tick broadcast channel.
    #[serde(default = "default_tick_buffer")]
    pub tick_buffer: usize,
    /// Seed for initial point positions.
    #[serde(default)]
    pub seed: u64,
    /// Point count used when a view's scene declares none.
    #[serde(default = "default_points")]
    pub default_points: u32,
}

const fn default_tick_interval_ms() -> u64 {
    50
}

const fn default_tick_buffer() -> usize {
    16
}

const fn default_points() -> u32 {
    64
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            tick_buffer: default_tick_buffer(),
            seed: 0,
            default_points: default_points(),
        }
    }
}

/// A live layout process for one view.
pub trait Simulation: Send + Sync {
    /// The view this simulation lays out.
    fn view_id(&self) -> &ViewId;

    /// Subscribe to the tick stream.
    ///
    /// Each call opens an independent subscription that starts at the next
    /// tick produced; ticks already produced are not replayed.
    fn ticks(&self) -> broadcast::Receiver<Arc<Tick>>;

    /// Feed a viewer interaction into the simulation.
    fn interact(&self, interaction: Interaction) -> Result<(), SimulationError>;

    /// Current renderer settings.
    fn render_config(&self) -> RenderConfig;

    /// Attach `session`'s render feedback, seeding it with `tick`.
    fn attach_render_feedback(&self, session: &SessionId, tick: &Tick);

    /// Detach `session`. A no-op if another session is attached by now.
    fn release(&self, session: &SessionId);
}

/// Factory for live layout simulations.
#[async_trait]
pub trait SimulationEngine: Send + Sync {
    /// Create the layout process for `view`.
    ///
    /// `dataset` is the view's dataset, if the workbook declares one; its
    /// `content_hash` names an edge-list artifact in `artifacts`.
    async fn create_or_attach(
        &self,
        view: &View,
        dataset: Option<&Dataset>,
        config: &LayoutConfig,
        artifacts: &Store<ContentHash, Arc<[u8]>>,
    ) -> Result<SimulationRef, SimulationError>;
}
