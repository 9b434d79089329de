//! Sink writing objects as files under a root directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::SinkError;
use crate::sink::{ObjectSink, UploadParams};

/// Stores each object at `{root}/{path}`.
#[derive(Debug, Clone)]
pub struct LocalDirSink {
    root: PathBuf,
}

impl LocalDirSink {
    /// A sink rooted at `root`. The directory is created on first upload.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

fn io_error(path: &str, err: &std::io::Error) -> SinkError {
    SinkError::Io {
        path: path.to_owned(),
        message: err.to_string(),
    }
}

#[async_trait]
impl ObjectSink for LocalDirSink {
    async fn upload(&self, path: &str, bytes: &[u8], params: &UploadParams) -> Result<(), SinkError> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(path, &e))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| io_error(path, &e))?;
        debug!(
            path = %target.display(),
            bytes = bytes.len(),
            content_type = params.content_type.as_deref().unwrap_or(""),
            "Object written"
        );
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, SinkError> {
        match tokio::fs::read(self.resolve(path)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(SinkError::NotFound(path.to_owned())),
            Err(e) => Err(io_error(path, &e)),
        }
    }
}
