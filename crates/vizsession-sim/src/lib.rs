//! Reference layout engine.
//!
//! [`LayoutEngine`] implements the loader's
//! [`SimulationEngine`](vizsession_loader::SimulationEngine) with a small
//! force-directed layout: one background task per view steps the layout on
//! a fixed interval and broadcasts each step as a
//! [`Tick`](vizsession_types::Tick) carrying the view's vertex buffers.

pub mod engine;
pub mod layout;
pub mod simulation;

pub use engine::LayoutEngine;
pub use layout::ForceLayout;
pub use simulation::LayoutSimulation;
