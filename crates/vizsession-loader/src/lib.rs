//! Document loader for the visualization session orchestrator.
//!
//! Resolves workbook and view identifiers to documents and views to live
//! layout simulations, populating and consulting the cache registry. The
//! loader is pure request/response: it holds no per-session state.
//!
//! # Modules
//!
//! - [`store`] -- [`BackingStore`] interface and [`StoreError`]
//! - [`memory`] -- In-memory store seeded from JSON documents
//! - [`dragonfly`] -- `Dragonfly` (Redis-compatible) store
//! - [`engine`] -- [`Simulation`] and [`SimulationEngine`] interfaces
//! - [`loader`] -- [`DocumentLoader`]
//! - [`error`] -- [`LoaderError`]

pub mod dragonfly;
pub mod engine;
pub mod error;
pub mod loader;
pub mod memory;
pub mod store;

pub use dragonfly::DragonflyStore;
pub use engine::{LayoutConfig, Simulation, SimulationEngine, SimulationError, SimulationRef};
pub use error::{DocumentKind, LoaderError};
pub use loader::{Caches, DocumentLoader, LoadedView};
pub use memory::MemoryStore;
pub use store::{BackingStore, StoreError};
