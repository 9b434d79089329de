//! The document loader.
//!
//! Every lookup goes through the cache registry's `get_or_create`, so a
//! workbook or simulation is fetched or created once no matter how many
//! sessions ask for it concurrently. A failed fetch is reported to every
//! waiting session and is retried by the next request.

use std::sync::Arc;

use tracing::{debug, info};
use vizsession_cache::CacheRegistry;
use vizsession_types::{ConnectOptions, View, ViewId, Workbook, WorkbookId};

use crate::engine::{LayoutConfig, SimulationEngine, SimulationRef};
use crate::error::{DocumentKind, LoaderError};
use crate::store::{BackingStore, StoreError};

/// The cache registry specialised to live simulation handles.
pub type Caches = CacheRegistry<SimulationRef>;

/// A resolved view together with the workbook snapshot it came from.
#[derive(Debug, Clone)]
pub struct LoadedView {
    /// Workbook snapshot the view was resolved from.
    pub workbook: Arc<Workbook>,
    /// The view document.
    pub view: View,
}

/// Resolves documents and simulations through the cache registry.
#[derive(Clone)]
pub struct DocumentLoader {
    caches: Arc<Caches>,
    store: Arc<dyn BackingStore>,
    engine: Arc<dyn SimulationEngine>,
    layout: LayoutConfig,
}

impl DocumentLoader {
    /// Create a loader over the given registry, store, and engine.
    pub fn new(
        caches: Arc<Caches>,
        store: Arc<dyn BackingStore>,
        engine: Arc<dyn SimulationEngine>,
        layout: LayoutConfig,
    ) -> Self {
        Self {
            caches,
            store,
            engine,
            layout,
        }
    }

    /// The cache registry this loader populates.
    pub const fn caches(&self) -> &Arc<Caches> {
        &self.caches
    }

    /// Resolve workbooks by id.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::NotFound`] if the store has no such workbook
    /// and [`LoaderError::Store`] if the store failed. A default document
    /// is never substituted.
    pub async fn load_workbooks(
        &self,
        workbook_ids: &[WorkbookId],
        options: &ConnectOptions,
    ) -> Result<Vec<Arc<Workbook>>, LoaderError> {
        let mut workbooks = Vec::with_capacity(workbook_ids.len());
        for id in workbook_ids {
            workbooks.push(self.load_workbook(id, options).await?);
        }
        Ok(workbooks)
    }

    async fn load_workbook(
        &self,
        id: &WorkbookId,
        options: &ConnectOptions,
    ) -> Result<Arc<Workbook>, LoaderError> {
        let store = Arc::clone(&self.store);
        let key = id.clone();
        let workbook = self
            .caches
            .workbooks_by_id
            .get_or_create(id.clone(), async move {
                let workbook = store.fetch_workbook(&key).await.map_err(LoaderError::from)?;
                info!(workbook_id = %key, views = workbook.views_by_id.len(), "Workbook fetched from store");
                Ok::<_, LoaderError>(Arc::new(workbook))
            })
            .await
            .map_err(|e| LoaderError::clone(&e))?;

        debug!(
            workbook_id = %id,
            debug_id = options.debug_id.as_deref().unwrap_or(""),
            usertag = options.usertag.as_deref().unwrap_or(""),
            "Workbook resolved"
        );
        Ok(workbook)
    }

    /// Resolve views of the given workbooks.
    ///
    /// With `view_ids` absent each workbook's current view is resolved.
    /// A view the workbook document does not embed is fetched from the
    /// store and written back as a replacement workbook entry.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::NotFound`] for an unknown workbook or view,
    /// or for a view that belongs to a different workbook.
    pub async fn load_views(
        &self,
        workbook_ids: &[WorkbookId],
        view_ids: Option<&[ViewId]>,
        options: &ConnectOptions,
    ) -> Result<Vec<LoadedView>, LoaderError> {
        let mut loaded = Vec::new();
        for workbook in self.load_workbooks(workbook_ids, options).await? {
            let requested: Vec<ViewId> = view_ids.map_or_else(
                || vec![workbook.current_view_id().clone()],
                <[ViewId]>::to_vec,
            );
            let mut workbook = workbook;
            for view_id in requested {
                let (next, view) = self.resolve_view(workbook, &view_id).await?;
                workbook = next;
                loaded.push(LoadedView {
                    workbook: Arc::clone(&workbook),
                    view,
                });
            }
        }
        Ok(loaded)
    }

    async fn resolve_view(
        &self,
        workbook: Arc<Workbook>,
        view_id: &ViewId,
    ) -> Result<(Arc<Workbook>, View), LoaderError> {
        if let Some(view) = workbook.view(view_id) {
            let view = view.clone();
            return Ok((workbook, view));
        }

        let view = match self.store.fetch_view(view_id).await {
            Ok(view) if view.workbook_id == workbook.id => view,
            Ok(_) | Err(StoreError::NotFound { .. }) => {
                return Err(LoaderError::NotFound {
                    kind: DocumentKind::View,
                    id: view_id.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        // Merge into whatever is cached now, not into our snapshot, so views
        // merged by concurrent sessions survive.
        let merged = view.clone();
        let replacement = self
            .caches
            .workbooks_by_id
            .upsert(workbook.id.clone(), move |cached| {
                let base = cached.unwrap_or(workbook);
                Arc::new(base.with_view(merged))
            })
            .await;
        debug!(workbook_id = %replacement.id, view_id = %view_id, "View merged into cached workbook");
        Ok((replacement, view))
    }

    /// Materialize, or reuse from `nBodiesById`, the layout simulation of
    /// a resolved view.
    ///
    /// The returned handle is owned by the caller until it calls
    /// [`Simulation::release`](crate::Simulation::release); the loader
    /// tracks nothing beyond the cache entry.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Simulation`] if the engine fails.
    pub async fn load_simulation(&self, loaded: &LoadedView) -> Result<SimulationRef, LoaderError> {
        let engine = Arc::clone(&self.engine);
        let caches = Arc::clone(&self.caches);
        let layout = self.layout.clone();
        let view = loaded.view.clone();
        let dataset = view
            .dataset_id
            .as_ref()
            .and_then(|id| loaded.workbook.dataset(id))
            .cloned();

        self.caches
            .n_bodies_by_id
            .get_or_create(loaded.view.id.clone(), async move {
                let simulation = engine
                    .create_or_attach(&view, dataset.as_ref(), &layout, &caches.artifact_cache)
                    .await
                    .map_err(LoaderError::from)?;
                info!(view_id = %view.id, "Layout simulation created");
                Ok::<_, LoaderError>(simulation)
            })
            .await
            .map_err(|e| LoaderError::clone(&e))
    }
}
