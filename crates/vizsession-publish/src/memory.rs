//! In-memory sink with per-path failure injection.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::SinkError;
use crate::sink::{ObjectSink, UploadParams};

/// Keeps uploaded objects in a map.
///
/// Uploads to a path registered with [`fail_path`](Self::fail_path) fail
/// without storing anything.
#[derive(Debug, Default)]
pub struct MemorySink {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    failing: RwLock<BTreeSet<String>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upload to `path` fail.
    pub async fn fail_path(&self, path: impl Into<String>) {
        self.failing.write().await.insert(path.into());
    }

    /// Paths of every stored object, sorted.
    pub async fn paths(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectSink for MemorySink {
    async fn upload(&self, path: &str, bytes: &[u8], _params: &UploadParams) -> Result<(), SinkError> {
        if self.failing.read().await.contains(path) {
            return Err(SinkError::Io {
                path: path.to_owned(),
                message: String::from("injected failure"),
            });
        }
        self.objects
            .write()
            .await
            .insert(path.to_owned(), bytes.to_vec());
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, SinkError> {
        self.objects
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| SinkError::NotFound(path.to_owned()))
    }
}
