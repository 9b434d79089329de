//! [`SimulationEngine`] implementation backed by [`ForceLayout`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use vizsession_cache::{ContentHash, Store};
use vizsession_loader::{LayoutConfig, SimulationEngine, SimulationError, SimulationRef};
use vizsession_types::{Dataset, View};

use crate::layout::ForceLayout;
use crate::simulation::LayoutSimulation;

/// Creates one [`LayoutSimulation`] per view.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutEngine;

impl LayoutEngine {
    /// Create the engine.
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SimulationEngine for LayoutEngine {
    async fn create_or_attach(
        &self,
        view: &View,
        dataset: Option<&Dataset>,
        config: &LayoutConfig,
        artifacts: &Store<ContentHash, Arc<[u8]>>,
    ) -> Result<SimulationRef, SimulationError> {
        let seed = config.seed ^ fnv1a(view.id.as_str().as_bytes());
        let declared = view.scene.points.elements;

        let layout = match dataset.and_then(|d| d.content_hash.as_deref()) {
            Some(hex) => {
                let edges = load_edge_list(hex, artifacts).await?;
                let highest = edges.iter().map(|&(a, b)| a.max(b)).max();
                let points = highest
                    .and_then(|h| h.checked_add(1))
                    .unwrap_or(0)
                    .max(declared);
                debug!(view_id = %view.id, points, edges = edges.len(), "Layout built from dataset artifact");
                ForceLayout::new(points, edges, seed)
            }
            None => {
                let points = if declared == 0 {
                    config.default_points
                } else {
                    declared
                };
                ForceLayout::ring(points, seed)
            }
        };

        let simulation: SimulationRef = LayoutSimulation::spawn(
            view.id.clone(),
            layout,
            view.scene.render.clone(),
            config.tick_interval_ms,
            config.tick_buffer,
        );
        Ok(simulation)
    }
}

/// Read a JSON edge list (`[[src, dst], ...]`) from the artifact cache.
async fn load_edge_list(
    hex: &str,
    artifacts: &Store<ContentHash, Arc<[u8]>>,
) -> Result<Vec<(u32, u32)>, SimulationError> {
    let invalid = |message: String| SimulationError::InvalidArtifact {
        hash: hex.to_owned(),
        message,
    };
    let hash = ContentHash::from_hex(hex).map_err(|e| invalid(e.to_string()))?;
    let bytes = artifacts
        .get(&hash)
        .await
        .ok_or_else(|| invalid(String::from("not present in artifact cache")))?;
    serde_json::from_slice(&bytes).map_err(|e| invalid(e.to_string()))
}

/// FNV-1a hash, used to derive a per-view layout seed.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325_u64, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}
