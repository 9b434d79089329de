//! Eviction policy configuration for cache namespaces.
//!
//! Every namespace should be bounded by capacity, by time-to-live, or by
//! both. A namespace with neither bound is accepted (the process keeps
//! working) but is reported as a configuration concern at startup, since
//! it grows for the life of the worker.

use serde::Deserialize;

/// Eviction policy of one namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct NamespaceConfig {
    /// Maximum number of entries, if bounded.
    #[serde(default)]
    pub max_capacity: Option<u64>,
    /// Seconds after insertion an entry expires, if time-boxed.
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

impl NamespaceConfig {
    /// A capacity-bounded namespace.
    pub const fn bounded(max_capacity: u64) -> Self {
        Self {
            max_capacity: Some(max_capacity),
            ttl_seconds: None,
        }
    }

    /// Whether the namespace has neither a capacity nor a TTL bound.
    pub const fn is_unbounded(&self) -> bool {
        self.max_capacity.is_none() && self.ttl_seconds.is_none()
    }
}

/// Eviction policies for all four namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    /// `vbos` namespace.
    #[serde(default = "default_vbos")]
    pub vbos: NamespaceConfig,
    /// `artifactCache` namespace.
    #[serde(default = "default_artifacts")]
    pub artifact_cache: NamespaceConfig,
    /// `nBodiesById` namespace.
    #[serde(default = "default_n_bodies")]
    pub n_bodies_by_id: NamespaceConfig,
    /// `workbooksById` namespace.
    #[serde(default = "default_workbooks")]
    pub workbooks_by_id: NamespaceConfig,
}

const fn default_vbos() -> NamespaceConfig {
    NamespaceConfig::bounded(256)
}

const fn default_artifacts() -> NamespaceConfig {
    NamespaceConfig::bounded(1024)
}

const fn default_n_bodies() -> NamespaceConfig {
    NamespaceConfig {
        max_capacity: Some(64),
        ttl_seconds: Some(3600),
    }
}

const fn default_workbooks() -> NamespaceConfig {
    NamespaceConfig {
        max_capacity: Some(1024),
        ttl_seconds: Some(600),
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            vbos: default_vbos(),
            artifact_cache: default_artifacts(),
            n_bodies_by_id: default_n_bodies(),
            workbooks_by_id: default_workbooks(),
        }
    }
}
