//! Error types for snapshot export.

/// Errors from a single object upload or download.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// No object at this path.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The storage backend failed.
    #[error("upload of {path} failed: {message}")]
    Io {
        /// Object path.
        path: String,
        /// What went wrong.
        message: String,
    },
}

/// Errors from publishing a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// A snapshot or workbook name cannot be used as a path segment.
    #[error("invalid content name: {0:?}")]
    InvalidName(String),

    /// The snapshot's JSON documents could not be encoded.
    #[error("snapshot encoding failed: {0}")]
    Encode(String),

    /// The render configuration or metadata upload failed. No buffer was
    /// uploaded.
    #[error("failed to upload snapshot metadata: {0}")]
    Metadata(String),

    /// The preview image upload failed.
    #[error("preview upload failed: {0}")]
    Preview(String),

    /// Some buffers failed to upload. The rest are available.
    #[error("{failed} buffers failed to upload ({uploaded} uploaded): {failed_names:?}")]
    PartialFailure {
        /// Buffers uploaded.
        uploaded: usize,
        /// Buffers that failed.
        failed: usize,
        /// Names of the buffers that failed, sorted.
        failed_names: Vec<String>,
    },
}
