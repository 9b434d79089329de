//! In-memory backing store.
//!
//! Used by tests and by development deployments that serve workbooks from
//! a directory of JSON documents.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};
use vizsession_types::{View, ViewId, Workbook, WorkbookId};

use crate::error::DocumentKind;
use crate::store::{BackingStore, StoreError};

/// Backing store holding documents in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    workbooks: RwLock<BTreeMap<WorkbookId, Workbook>>,
    views: RwLock<BTreeMap<ViewId, View>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` workbook document in `dir`.
    ///
    /// Files that fail to parse are skipped with a warning.
    pub async fn from_dir(dir: &Path) -> Result<Self, StoreError> {
        let store = Self::new();
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| StoreError::Unavailable(format!("read {}: {e}", dir.display())))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Unavailable(format!("read {}: {e}", dir.display())))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable workbook file");
                    continue;
                }
            };
            match serde_json::from_str::<Workbook>(&contents) {
                Ok(workbook) => store.insert_workbook(workbook).await,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping invalid workbook document");
                }
            }
        }

        info!(
            dir = %dir.display(),
            workbooks = store.workbooks.read().await.len(),
            "Memory store seeded"
        );
        Ok(store)
    }

    /// Insert or replace a workbook.
    pub async fn insert_workbook(&self, workbook: Workbook) {
        self.workbooks.write().await.insert(workbook.id.clone(), workbook);
    }

    /// Insert or replace a standalone view.
    pub async fn insert_view(&self, view: View) {
        self.views.write().await.insert(view.id.clone(), view);
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    async fn fetch_workbook(&self, id: &WorkbookId) -> Result<Workbook, StoreError> {
        self.workbooks
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: DocumentKind::Workbook,
                id: id.to_string(),
            })
    }

    async fn fetch_view(&self, id: &ViewId) -> Result<View, StoreError> {
        self.views
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: DocumentKind::View,
                id: id.to_string(),
            })
    }
}
