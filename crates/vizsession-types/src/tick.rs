//! Simulation ticks and captured VBO sets.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ViewId;

/// One state snapshot emitted by a view's layout simulation.
///
/// Ticks are produced in strictly increasing `step` order and shared
/// between consumers as `Arc<Tick>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// The view whose simulation produced this tick.
    pub view_id: ViewId,
    /// Monotonic step counter of the simulation.
    pub step: u64,
    /// Number of points in the layout.
    pub point_count: u32,
    /// Number of edges in the layout.
    pub edge_count: u32,
    /// Named vertex buffers (`curPoints`, `edgeColors`, ...).
    pub buffers: BTreeMap<String, Vec<u8>>,
    /// Wall-clock time the tick was produced.
    pub produced_at: DateTime<Utc>,
}

impl Tick {
    /// Total size of all buffers in bytes.
    pub fn byte_len(&self) -> usize {
        self.buffers.values().map(Vec::len).fold(0, usize::saturating_add)
    }
}

/// The most recent vertex buffers dispatched for a view.
///
/// Stored in the `vbos` cache namespace and used as the source of static
/// snapshot exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VboSet {
    /// The view the buffers belong to.
    pub view_id: ViewId,
    /// Simulation step the buffers were captured at.
    pub step: u64,
    /// Element counts keyed by element kind (`point`, `edge`).
    pub elements: BTreeMap<String, u32>,
    /// Named vertex buffers.
    pub buffers: BTreeMap<String, Vec<u8>>,
    /// Capture time.
    pub captured_at: DateTime<Utc>,
}

impl VboSet {
    /// Capture the buffers carried by `tick`.
    pub fn from_tick(tick: &Tick) -> Self {
        let mut elements = BTreeMap::new();
        elements.insert(String::from("point"), tick.point_count);
        elements.insert(String::from("edge"), tick.edge_count);
        Self {
            view_id: tick.view_id.clone(),
            step: tick.step,
            elements,
            buffers: tick.buffers.clone(),
            captured_at: Utc::now(),
        }
    }

    /// Byte length of each buffer, keyed by name.
    pub fn buffer_byte_lengths(&self) -> BTreeMap<String, usize> {
        self.buffers
            .iter()
            .map(|(name, bytes)| (name.clone(), bytes.len()))
            .collect()
    }
}
