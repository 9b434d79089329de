//! Snapshot export for live visualizations.
//!
//! A snapshot is the render configuration, the element/byte-length
//! metadata, and the layout buffers of one view at one step, published
//! under a [`ContentSchema`] path through an [`ObjectSink`].
//!
//! Uploads are staged so a partial failure leaves the most useful subset
//! available: the JSON documents go first and must all succeed; the
//! buffers follow concurrently and report exactly which ones failed.

pub mod error;
pub mod local;
pub mod memory;
pub mod publisher;
pub mod schema;
pub mod sink;

pub use error::{PublishError, SinkError};
pub use local::LocalDirSink;
pub use memory::MemorySink;
pub use publisher::{PublishReport, SnapshotContent, SnapshotMetadata, StagedPublisher};
pub use schema::ContentSchema;
pub use sink::{ObjectSink, UploadParams};
