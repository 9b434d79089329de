//! A single cache namespace backed by [`moka::future::Cache`].

use core::fmt;
use std::future::{self, Future};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use moka::Entry;
use moka::future::Cache;
use tracing::{debug, warn};

use crate::config::NamespaceConfig;

/// The four registry namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Latest vertex buffers per view.
    Vbos,
    /// Content-addressed artifacts.
    ArtifactCache,
    /// Live layout simulations per view.
    NBodiesById,
    /// Workbook documents.
    WorkbooksById,
}

impl Namespace {
    /// Name used in logs and the HTTP API.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vbos => "vbos",
            Self::ArtifactCache => "artifactCache",
            Self::NBodiesById => "nBodiesById",
            Self::WorkbooksById => "workbooksById",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One keyed namespace.
///
/// Values are replaced on write and never mutated in place; callers that
/// need shared mutable state keep it behind the value (for example an
/// `Arc` to a live handle).
#[derive(Clone)]
pub struct Store<K, V> {
    namespace: Namespace,
    inner: Cache<K, V>,
}

impl<K, V> Store<K, V>
where
    K: Hash + Eq + Send + Sync + fmt::Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Build a namespace with the given eviction policy.
    pub fn new(namespace: Namespace, config: &NamespaceConfig) -> Self {
        if config.is_unbounded() {
            warn!(
                namespace = namespace.as_str(),
                "cache namespace has neither max_capacity nor ttl_seconds; it will grow without bound"
            );
        }

        let mut builder = Cache::builder();
        if let Some(capacity) = config.max_capacity {
            builder = builder.max_capacity(capacity);
        }
        if let Some(ttl) = config.ttl_seconds {
            builder = builder.time_to_live(Duration::from_secs(ttl));
        }

        Self {
            namespace,
            inner: builder.build(),
        }
    }

    /// The namespace this store serves.
    pub const fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Look up `key`.
    pub async fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).await
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub async fn put(&self, key: K, value: V) {
        self.inner.insert(key, value).await;
    }

    /// Return the cached value for `key`, running `factory` on a miss.
    ///
    /// The factory runs at most once per key at a time: concurrent callers
    /// for the same key wait on the pending computation and all observe its
    /// result. A failed computation is handed to every waiter and is not
    /// cached, so the next call runs a fresh factory.
    pub async fn get_or_create<F, E>(&self, key: K, factory: F) -> Result<V, Arc<E>>
    where
        F: Future<Output = Result<V, E>>,
        E: Send + Sync + 'static,
    {
        let namespace = self.namespace.as_str();
        let label = format!("{key:?}");
        self.inner
            .try_get_with(key, async move {
                debug!(namespace, key = %label, "cache miss, computing entry");
                factory.await
            })
            .await
    }

    /// Replace the entry for `key` with `f(current)`, atomically with
    /// respect to other writers of the same key, and return the new value.
    ///
    /// Concurrent upserts of one key run one after another, each seeing the
    /// value the previous one stored.
    pub async fn upsert<F>(&self, key: K, f: F) -> V
    where
        F: FnOnce(Option<V>) -> V,
    {
        self.inner
            .entry(key)
            .and_upsert_with(|current| future::ready(f(current.map(Entry::into_value))))
            .await
            .into_value()
    }

    /// Remove `key`.
    pub async fn invalidate(&self, key: &K) {
        self.inner.invalidate(key).await;
    }

    /// Remove every entry.
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Number of live entries after pending maintenance has run.
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}
