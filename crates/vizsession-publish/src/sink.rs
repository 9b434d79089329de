//! Object storage interface.

use async_trait::async_trait;

use crate::error::SinkError;

/// Per-object upload settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadParams {
    /// MIME type of the object.
    pub content_type: Option<String>,
    /// Content encoding the bytes are already in, e.g. `gzip`.
    pub content_encoding: Option<String>,
    /// Whether the object is world-readable.
    pub public: bool,
}

impl UploadParams {
    /// Public JSON document.
    pub fn json() -> Self {
        Self {
            content_type: Some(String::from("application/json")),
            content_encoding: None,
            public: true,
        }
    }

    /// Public binary buffer.
    pub fn binary() -> Self {
        Self {
            content_type: Some(String::from("application/octet-stream")),
            content_encoding: None,
            public: true,
        }
    }
}

/// Destination for published objects.
#[async_trait]
pub trait ObjectSink: Send + Sync {
    /// Store `bytes` at `path`, replacing any previous object.
    async fn upload(&self, path: &str, bytes: &[u8], params: &UploadParams) -> Result<(), SinkError>;

    /// Read back the object at `path`.
    async fn download(&self, path: &str) -> Result<Vec<u8>, SinkError>;
}
