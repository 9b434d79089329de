//! Type-safe identifier wrappers.
//!
//! Workbook, view, and dataset identifiers arrive from viewers (query
//! parameters) and from the backing store, so they are opaque strings
//! rather than UUIDs. Session identifiers are minted server-side with
//! UUID v7 (time-ordered) so log lines sort by connection time.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`String`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub String);

        impl $name {
            /// Wrap an existing identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

define_id! {
    /// Stable identifier of a saved workbook.
    WorkbookId
}

define_id! {
    /// Identifier of a view within a workbook.
    ViewId
}

define_id! {
    /// Identifier of a dataset referenced by a workbook.
    DatasetId
}

define_id! {
    /// Identifier of a published static snapshot.
    SnapshotId
}

define_id! {
    /// Identifier of one transport connection.
    SessionId
}

impl SessionId {
    /// Mint a fresh session identifier (UUID v7).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}
