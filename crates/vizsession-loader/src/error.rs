//! Error types for the document loader.

use core::fmt;

use crate::engine::SimulationError;
use crate::store::StoreError;

/// Kind of document a lookup was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// A workbook.
    Workbook,
    /// A view.
    View,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workbook => f.write_str("workbook"),
            Self::View => f.write_str("view"),
        }
    }
}

/// Errors returned by the [`DocumentLoader`](crate::DocumentLoader).
///
/// `Clone` so that one failed cache computation can be handed to every
/// caller that waited on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoaderError {
    /// The backing store has no such workbook or view.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of document.
        kind: DocumentKind,
        /// The requested id.
        id: String,
    },

    /// The backing store failed.
    #[error("store error: {0}")]
    Store(String),

    /// The layout simulation could not be created.
    #[error("simulation error: {0}")]
    Simulation(String),
}

impl From<StoreError> for LoaderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            other @ (StoreError::Unavailable(_) | StoreError::Corrupt { .. }) => {
                Self::Store(other.to_string())
            }
        }
    }
}

impl From<SimulationError> for LoaderError {
    fn from(err: SimulationError) -> Self {
        Self::Simulation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_stays_not_found() {
        let err = LoaderError::from(StoreError::NotFound {
            kind: DocumentKind::Workbook,
            id: String::from("wb9"),
        });
        assert_eq!(err.to_string(), "workbook not found: wb9");
    }

    #[test]
    fn unavailable_becomes_store_error() {
        let err = LoaderError::from(StoreError::Unavailable(String::from("refused")));
        assert!(matches!(err, LoaderError::Store(msg) if msg.contains("refused")));
    }
}
