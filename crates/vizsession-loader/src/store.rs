//! Backing store interface for workbook and view documents.

use async_trait::async_trait;
use vizsession_types::{View, ViewId, Workbook, WorkbookId};

use crate::error::DocumentKind;

/// Errors returned by a [`BackingStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store has no document with this id.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of document.
        kind: DocumentKind,
        /// The requested id.
        id: String,
    },

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The stored document could not be decoded.
    #[error("corrupt document {id}: {message}")]
    Corrupt {
        /// The document id.
        id: String,
        /// Decoder message.
        message: String,
    },
}

/// Source of persisted workbook and view documents.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Fetch a workbook document.
    async fn fetch_workbook(&self, id: &WorkbookId) -> Result<Workbook, StoreError>;

    /// Fetch a view document that is not embedded in its workbook.
    async fn fetch_view(&self, id: &ViewId) -> Result<View, StoreError>;
}
