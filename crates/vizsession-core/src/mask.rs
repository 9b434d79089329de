//! Masking: the part of a tick a viewer is shown.
//!
//! A [`MaskProvider`] turns a tick into a [`MaskedFrame`], the full set of
//! path-addressed values the viewer's document should hold at that step.
//! The dispatcher diffs consecutive frames into deltas.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use vizsession_types::{Tick, View, paths};

/// Path-addressed document values for one tick.
pub type MaskedFrame = BTreeMap<String, Value>;

/// The mask computation failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct MaskError(pub String);

/// Computes the viewer-visible frame for a tick.
#[async_trait]
pub trait MaskProvider: Send + Sync {
    /// Mask `tick` as seen through `view`.
    async fn mask(&self, view: &View, tick: &Tick) -> Result<MaskedFrame, MaskError>;
}

/// Masks a tick down to scene element counts, expression templates, and
/// the simulation step.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneMask;

#[async_trait]
impl MaskProvider for SceneMask {
    async fn mask(&self, view: &View, tick: &Tick) -> Result<MaskedFrame, MaskError> {
        if tick.view_id != view.id {
            return Err(MaskError(format!(
                "tick for view {} masked through view {}",
                tick.view_id, view.id
            )));
        }

        let mut frame = MaskedFrame::new();
        frame.insert(
            paths::EXPRESSION_TEMPLATES_LENGTH.to_owned(),
            Value::from(view.expression_templates.len()),
        );
        frame.insert(
            paths::SCENE_POINTS_ELEMENTS.to_owned(),
            Value::from(tick.point_count),
        );
        frame.insert(
            paths::SCENE_EDGES_ELEMENTS.to_owned(),
            Value::from(tick.edge_count),
        );
        frame.insert(paths::SIMULATION_STEP.to_owned(), Value::from(tick.step));
        Ok(frame)
    }
}
