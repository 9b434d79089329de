//! Workbook, view, dataset, and scene documents.
//!
//! Documents are plain data. Live state attached to a view (its layout
//! simulation and its session binding) is held by the cache registry and
//! the binding registry, keyed by [`ViewId`], never inside the document.
//! Documents handed to sessions are immutable snapshots; changes are made
//! by building a replacement document (see [`Workbook::with_view`]).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{DatasetId, ViewId, WorkbookId};

/// Current workbook document schema version.
pub const LATEST_WORKBOOK_VERSION: u32 = 3;

/// Scene presets a dataset may request. Anything else falls back to `default`.
pub const KNOWN_SCENES: &[&str] = &["default", "transparent", "netflow", "gis"];

/// A saved collection of views and datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Workbook {
    /// Stable workbook identifier.
    pub id: WorkbookId,
    /// Document schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Human-readable title.
    #[serde(default)]
    pub title: String,
    /// Ordered views: the current pointer plus history.
    pub views: ViewList,
    /// View documents embedded in this workbook.
    #[serde(default)]
    pub views_by_id: BTreeMap<ViewId, View>,
    /// Datasets referenced by the views.
    #[serde(default)]
    pub datasets: Vec<Dataset>,
}

const fn default_version() -> u32 {
    LATEST_WORKBOOK_VERSION
}

impl Workbook {
    /// Create a workbook with a single default view over `dataset`.
    ///
    /// The view identifier is derived from the workbook identifier so the
    /// same inputs always produce the same document.
    pub fn with_dataset(id: WorkbookId, dataset: Dataset) -> Self {
        let view_id = ViewId::new(format!("{id}:view:0"));
        let view = View {
            id: view_id.clone(),
            workbook_id: id.clone(),
            title: String::from("Default view"),
            dataset_id: Some(dataset.id.clone()),
            scene: Scene::default(),
            expression_templates: Vec::new(),
        };
        let mut views_by_id = BTreeMap::new();
        views_by_id.insert(view_id.clone(), view);
        Self {
            id,
            version: LATEST_WORKBOOK_VERSION,
            title: String::new(),
            views: ViewList {
                current: view_id,
                history: Vec::new(),
            },
            views_by_id,
            datasets: vec![dataset.normalized()],
        }
    }

    /// Identifier of the view the current pointer refers to.
    pub const fn current_view_id(&self) -> &ViewId {
        &self.views.current
    }

    /// Look up an embedded view.
    pub fn view(&self, id: &ViewId) -> Option<&View> {
        self.views_by_id.get(id)
    }

    /// Look up a dataset referenced by this workbook.
    pub fn dataset(&self, id: &DatasetId) -> Option<&Dataset> {
        self.datasets.iter().find(|d| &d.id == id)
    }

    /// Build a replacement document that embeds `view`.
    ///
    /// The receiver is left untouched; cached documents are replaced,
    /// never mutated in place.
    #[must_use]
    pub fn with_view(&self, view: View) -> Self {
        let mut next = self.clone();
        next.views_by_id.insert(view.id.clone(), view);
        next
    }
}

/// The current view pointer plus the views that were current before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ViewList {
    /// The view opened by default.
    pub current: ViewId,
    /// Previously current views, oldest first.
    #[serde(default)]
    pub history: Vec<ViewId>,
}

/// One live visualization configuration within a workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct View {
    /// View identifier.
    pub id: ViewId,
    /// The workbook this view belongs to.
    pub workbook_id: WorkbookId,
    /// Human-readable title.
    #[serde(default)]
    pub title: String,
    /// Dataset laid out by this view's simulation.
    #[serde(default)]
    pub dataset_id: Option<DatasetId>,
    /// Scene and render configuration.
    #[serde(default)]
    pub scene: Scene,
    /// Saved filter/exclusion expression templates.
    #[serde(default)]
    pub expression_templates: Vec<String>,
}

/// Scene description: element counts and render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Scene {
    /// Scene preset name.
    pub name: String,
    /// Point (node) elements.
    pub points: SceneElements,
    /// Edge elements.
    pub edges: SceneElements,
    /// Renderer settings.
    pub render: RenderConfig,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            name: String::from("default"),
            points: SceneElements { elements: 0 },
            edges: SceneElements { elements: 0 },
            render: RenderConfig::default(),
        }
    }
}

/// Number of renderable elements of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SceneElements {
    /// Element count.
    pub elements: u32,
}

/// Settings the renderer is seeded with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RenderConfig {
    /// Background color as a CSS hex string.
    pub background: String,
    /// Point size multiplier.
    pub point_scale: f32,
    /// Edge width multiplier.
    pub edge_scale: f32,
    /// Whether edges are drawn with arrow heads.
    pub show_arrows: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            background: String::from("#333339"),
            point_scale: 1.0,
            edge_scale: 1.0,
            show_arrows: true,
        }
    }
}

/// A dataset referenced by a workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Dataset {
    /// Dataset identifier.
    pub id: DatasetId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Location of the dataset.
    #[serde(default)]
    pub url: String,
    /// Scene preset.
    #[serde(default = "default_preset")]
    pub scene: String,
    /// Mapper preset.
    #[serde(default = "default_preset")]
    pub mapper: String,
    /// Device preset.
    #[serde(default = "default_preset")]
    pub device: String,
    /// Vendor preset.
    #[serde(default = "default_preset")]
    pub vendor: String,
    /// BLAKE3 hex digest of the edge list in the artifact cache, if uploaded.
    #[serde(default)]
    pub content_hash: Option<String>,
}

fn default_preset() -> String {
    String::from("default")
}

impl Dataset {
    /// Create a dataset with default presets.
    pub fn new(id: DatasetId) -> Self {
        Self {
            id,
            name: String::new(),
            url: String::new(),
            scene: default_preset(),
            mapper: default_preset(),
            device: default_preset(),
            vendor: default_preset(),
            content_hash: None,
        }
    }

    /// Apply preset fallbacks.
    ///
    /// Unknown scenes become `default`, an empty url falls back to the
    /// dataset id, and an empty name falls back to the url.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if !KNOWN_SCENES.contains(&self.scene.as_str()) {
            self.scene = default_preset();
        }
        if self.url.is_empty() {
            self.url.clone_from(&self.id.0);
        }
        if self.name.is_empty() {
            self.name.clone_from(&self.url);
        }
        self
    }
}
