//! Process-wide cache registry for the visualization session orchestrator.
//!
//! The registry is created once at process start and passed by reference
//! to every component that needs it. It holds four namespaces:
//!
//! | Namespace | Key | Value |
//! |-----------|-----|-------|
//! | `vbos` | [`ViewId`] | latest [`VboSet`] dispatched for the view |
//! | `artifactCache` | [`ContentHash`] | immutable content-addressed bytes |
//! | `nBodiesById` | [`ViewId`] | live layout simulation handle |
//! | `workbooksById` | [`WorkbookId`] | `Arc<Workbook>` document snapshot |
//!
//! Entries are created on first load, read on lookup, replaced (never
//! mutated) on write, and evicted by each namespace's capacity/TTL policy.
//!
//! [`ViewId`]: vizsession_types::ViewId
//! [`WorkbookId`]: vizsession_types::WorkbookId
//! [`VboSet`]: vizsession_types::VboSet

pub mod config;
pub mod error;
pub mod hash;
pub mod registry;
pub mod store;

pub use config::{CacheConfig, NamespaceConfig};
pub use error::CacheError;
pub use hash::ContentHash;
pub use registry::{CacheRegistry, NamespaceStats};
pub use store::{Namespace, Store};
