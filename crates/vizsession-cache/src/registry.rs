//! The cache registry: all four namespaces behind one value.

use std::sync::Arc;

use tracing::info;
use vizsession_types::{VboSet, ViewId, Workbook, WorkbookId};

use crate::config::CacheConfig;
use crate::hash::ContentHash;
use crate::store::{Namespace, Store};

/// Entry count of one namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceStats {
    /// The namespace.
    pub namespace: Namespace,
    /// Number of live entries.
    pub entry_count: u64,
}

/// Process-wide keyed stores.
///
/// `H` is the live simulation handle type held in `nBodiesById`; the
/// registry itself has no opinion on what a simulation is.
///
/// Created once at process start, shared as `Arc<CacheRegistry<H>>`, and
/// torn down with [`CacheRegistry::shutdown`] when the worker stops.
pub struct CacheRegistry<H> {
    /// Latest vertex buffers dispatched per view.
    pub vbos: Store<ViewId, Arc<VboSet>>,
    /// Immutable content-addressed artifacts.
    pub artifact_cache: Store<ContentHash, Arc<[u8]>>,
    /// Live layout simulations per view.
    pub n_bodies_by_id: Store<ViewId, H>,
    /// Workbook documents.
    pub workbooks_by_id: Store<WorkbookId, Arc<Workbook>>,
}

impl<H> CacheRegistry<H>
where
    H: Clone + Send + Sync + 'static,
{
    /// Create the registry with the given eviction policies.
    pub fn new(config: &CacheConfig) -> Self {
        let registry = Self {
            vbos: Store::new(Namespace::Vbos, &config.vbos),
            artifact_cache: Store::new(Namespace::ArtifactCache, &config.artifact_cache),
            n_bodies_by_id: Store::new(Namespace::NBodiesById, &config.n_bodies_by_id),
            workbooks_by_id: Store::new(Namespace::WorkbooksById, &config.workbooks_by_id),
        };
        info!(
            vbos = ?config.vbos.max_capacity,
            artifacts = ?config.artifact_cache.max_capacity,
            n_bodies = ?config.n_bodies_by_id.max_capacity,
            workbooks = ?config.workbooks_by_id.max_capacity,
            "Cache registry created"
        );
        registry
    }

    /// Store `bytes` under their content hash and return the hash.
    ///
    /// Storing the same bytes twice yields the same key.
    pub async fn put_artifact(&self, bytes: impl Into<Arc<[u8]>>) -> ContentHash {
        let bytes = bytes.into();
        let hash = ContentHash::of(&bytes);
        self.artifact_cache.put(hash, bytes).await;
        hash
    }

    /// Look up an artifact by content hash.
    pub async fn artifact(&self, hash: &ContentHash) -> Option<Arc<[u8]>> {
        self.artifact_cache.get(hash).await
    }

    /// Entry counts for every namespace.
    pub async fn stats(&self) -> Vec<NamespaceStats> {
        vec![
            NamespaceStats {
                namespace: Namespace::Vbos,
                entry_count: self.vbos.entry_count().await,
            },
            NamespaceStats {
                namespace: Namespace::ArtifactCache,
                entry_count: self.artifact_cache.entry_count().await,
            },
            NamespaceStats {
                namespace: Namespace::NBodiesById,
                entry_count: self.n_bodies_by_id.entry_count().await,
            },
            NamespaceStats {
                namespace: Namespace::WorkbooksById,
                entry_count: self.workbooks_by_id.entry_count().await,
            },
        ]
    }

    /// Drop every entry in every namespace.
    pub fn shutdown(&self) {
        self.vbos.invalidate_all();
        self.artifact_cache.invalidate_all();
        self.n_bodies_by_id.invalidate_all();
        self.workbooks_by_id.invalidate_all();
        info!("Cache registry torn down");
    }
}
