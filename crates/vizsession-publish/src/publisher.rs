//! Staged snapshot publication.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vizsession_types::{RenderConfig, SnapshotId, VboSet};

use crate::error::PublishError;
use crate::schema::ContentSchema;
use crate::sink::{ObjectSink, UploadParams};

const RENDER_CONFIG_FILE: &str = "renderconfig.json";
const METADATA_FILE: &str = "metadata.json";
const BUFFER_EXTENSION: &str = "vbo";

/// Element counts and buffer sizes the viewer needs to read the buffers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    /// Element count per element kind.
    pub elements: BTreeMap<String, u32>,
    /// Byte length per buffer name.
    pub buffer_byte_lengths: BTreeMap<String, usize>,
}

/// Everything published for one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotContent {
    /// Renderer settings.
    pub render_config: RenderConfig,
    /// Element counts and buffer sizes.
    pub metadata: SnapshotMetadata,
    /// Raw buffers by name.
    pub buffers: BTreeMap<String, Vec<u8>>,
}

impl SnapshotContent {
    /// Content for a captured set of layout buffers.
    pub fn from_vbos(vbos: &VboSet, render_config: RenderConfig) -> Self {
        Self {
            render_config,
            metadata: SnapshotMetadata {
                elements: vbos.elements.clone(),
                buffer_byte_lengths: vbos.buffer_byte_lengths(),
            },
            buffers: vbos.buffers.clone(),
        }
    }
}

/// A successfully published snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    /// The snapshot.
    pub snapshot_id: SnapshotId,
    /// Path prefix the snapshot was published under.
    pub prefix: String,
    /// Buffers uploaded.
    pub uploaded: usize,
}

/// Publishes snapshots in two stages.
///
/// Stage one uploads the render configuration and metadata; if either
/// fails nothing else is attempted. Stage two uploads every buffer
/// concurrently. Failed buffers are reported, never retried, and do not
/// roll back the ones that succeeded.
#[derive(Clone)]
pub struct StagedPublisher {
    sink: Arc<dyn ObjectSink>,
    schema: ContentSchema,
}

impl StagedPublisher {
    /// Create a publisher writing through `sink` under `schema`.
    pub fn new(sink: Arc<dyn ObjectSink>, schema: ContentSchema) -> Self {
        Self { sink, schema }
    }

    /// Publish `content` as `snapshot_id`.
    ///
    /// # Errors
    ///
    /// - [`PublishError::InvalidName`] if the snapshot id is not a valid
    ///   path segment.
    /// - [`PublishError::Metadata`] if stage one failed.
    /// - [`PublishError::PartialFailure`] if some buffers failed.
    pub async fn publish(
        &self,
        snapshot_id: &SnapshotId,
        content: &SnapshotContent,
    ) -> Result<PublishReport, PublishError> {
        let schema = self.schema.for_snapshot(snapshot_id.as_str())?;

        let render_config = serde_json::to_vec(&content.render_config)
            .map_err(|e| PublishError::Encode(e.to_string()))?;
        let metadata = serde_json::to_vec(&content.metadata)
            .map_err(|e| PublishError::Encode(e.to_string()))?;

        let json = UploadParams::json();
        let render_path = schema.path_for(RENDER_CONFIG_FILE);
        let metadata_path = schema.path_for(METADATA_FILE);
        let (render_result, metadata_result) = futures::join!(
            self.sink.upload(&render_path, &render_config, &json),
            self.sink.upload(&metadata_path, &metadata, &json),
        );
        if let Err(e) = render_result.and(metadata_result) {
            warn!(snapshot_id = %snapshot_id, error = %e, "Snapshot metadata upload failed");
            return Err(PublishError::Metadata(e.to_string()));
        }

        let binary = UploadParams::binary();
        let uploads = content.buffers.iter().map(|(name, bytes)| {
            let path = schema.path_for(&format!("{name}.{BUFFER_EXTENSION}"));
            let binary = &binary;
            async move { (name, self.sink.upload(&path, bytes, binary).await) }
        });

        let mut uploaded = 0_usize;
        let mut failed_names = Vec::new();
        for (name, result) in join_all(uploads).await {
            match result {
                Ok(()) => uploaded = uploaded.saturating_add(1),
                Err(e) => {
                    warn!(snapshot_id = %snapshot_id, buffer = %name, error = %e, "Buffer upload failed");
                    failed_names.push(name.clone());
                }
            }
        }

        if !failed_names.is_empty() {
            return Err(PublishError::PartialFailure {
                uploaded,
                failed: failed_names.len(),
                failed_names,
            });
        }

        info!(snapshot_id = %snapshot_id, prefix = schema.prefix(), buffers = uploaded, "Snapshot published");
        Ok(PublishReport {
            snapshot_id: snapshot_id.clone(),
            prefix: schema.prefix().to_owned(),
            uploaded,
        })
    }

    /// Publish a preview image next to an already published snapshot.
    ///
    /// # Errors
    ///
    /// [`PublishError::InvalidName`] for an invalid snapshot id or image
    /// name, [`PublishError::Preview`] if the upload failed.
    pub async fn publish_preview(
        &self,
        snapshot_id: &SnapshotId,
        image_name: Option<&str>,
        png: &[u8],
    ) -> Result<String, PublishError> {
        let schema = self.schema.for_snapshot(snapshot_id.as_str())?;
        let image_name = image_name.unwrap_or("preview.png");
        if image_name.contains('/') || image_name.is_empty() {
            return Err(PublishError::InvalidName(image_name.to_owned()));
        }
        let path = schema.path_for(image_name);
        let params = UploadParams {
            content_type: Some(String::from("image/png")),
            content_encoding: None,
            public: true,
        };
        self.sink
            .upload(&path, png, &params)
            .await
            .map_err(|e| PublishError::Preview(e.to_string()))?;
        Ok(path)
    }
}
