//! `Dragonfly` (Redis-compatible) backing store.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `workbook:{id}` | JSON | Workbook document with embedded views |
//! | `view:{id}` | JSON | Standalone view document |

use async_trait::async_trait;
use fred::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;
use vizsession_types::{View, ViewId, Workbook, WorkbookId};

use crate::error::DocumentKind;
use crate::store::{BackingStore, StoreError};

/// Backing store reading JSON documents from `Dragonfly`.
#[derive(Clone)]
pub struct DragonflyStore {
    client: Client,
}

impl DragonflyStore {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the URL cannot be parsed or
    /// the connection fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let config = Config::from_url(url)
            .map_err(|e| StoreError::Unavailable(format!("invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("Dragonfly client: {e}")))?;
        client
            .init()
            .await
            .map_err(|e| StoreError::Unavailable(format!("Dragonfly connect: {e}")))?;

        tracing::info!("Connected to Dragonfly");
        Ok(Self { client })
    }

    /// Store a workbook document under `workbook:{id}`.
    pub async fn put_workbook(&self, workbook: &Workbook) -> Result<(), StoreError> {
        self.set_json(&workbook_key(&workbook.id), workbook).await
    }

    /// Store a view document under `view:{id}`.
    pub async fn put_view(&self, view: &View) -> Result<(), StoreError> {
        self.set_json(&view_key(&view.id), view).await
    }

    async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(value).map_err(|e| StoreError::Corrupt {
            id: key.to_owned(),
            message: e.to_string(),
        })?;
        let _: () = self
            .client
            .set(key, json.as_str(), None, None, false)
            .await
            .map_err(|e| StoreError::Unavailable(format!("SET {key}: {e}")))?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        key: &str,
        kind: DocumentKind,
        id: &str,
    ) -> Result<T, StoreError> {
        let value: Option<String> = self
            .client
            .get(key)
            .await
            .map_err(|e| StoreError::Unavailable(format!("GET {key}: {e}")))?;
        let json = value.ok_or_else(|| StoreError::NotFound {
            kind,
            id: id.to_owned(),
        })?;
        serde_json::from_str(&json).map_err(|e| StoreError::Corrupt {
            id: id.to_owned(),
            message: e.to_string(),
        })
    }
}

fn workbook_key(id: &WorkbookId) -> String {
    format!("workbook:{id}")
}

fn view_key(id: &ViewId) -> String {
    format!("view:{id}")
}

#[async_trait]
impl BackingStore for DragonflyStore {
    async fn fetch_workbook(&self, id: &WorkbookId) -> Result<Workbook, StoreError> {
        self.get_json(&workbook_key(id), DocumentKind::Workbook, id.as_str())
            .await
    }

    async fn fetch_view(&self, id: &ViewId) -> Result<View, StoreError> {
        self.get_json(&view_key(id), DocumentKind::View, id.as_str())
            .await
    }
}
