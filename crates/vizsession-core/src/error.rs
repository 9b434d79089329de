//! Error taxonomy of the session pipeline.
//!
//! Setup errors ([`SessionError`]) are fatal for the session and are sent
//! to the viewer before the transport closes. Per-tick delta errors
//! ([`DeltaPublishError`]) are logged and recovered from; the next tick's
//! delta is computed against full state.

use vizsession_loader::LoaderError;
use vizsession_types::ErrorKind;

/// Transport-level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection is closed.
    #[error("transport closed")]
    Closed,

    /// The socket failed.
    #[error("transport I/O error: {0}")]
    Io(String),

    /// A message could not be encoded. The connection itself is intact.
    #[error("message encoding failed: {0}")]
    Encode(String),
}

impl TransportError {
    /// Whether the connection is unusable after this error.
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Encode(_))
    }
}

/// A single tick's delta could not be published.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeltaPublishError {
    /// The mask computation failed.
    #[error("mask computation failed at step {step}: {message}")]
    Mask {
        /// Simulation step.
        step: u64,
        /// What went wrong.
        message: String,
    },

    /// The delta could not be encoded.
    #[error("delta encoding failed at step {step}: {message}")]
    Encode {
        /// Simulation step.
        step: u64,
        /// What went wrong.
        message: String,
    },
}

/// Outcome of dispatching one tick.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// Recoverable: this tick's delta was lost.
    #[error(transparent)]
    Delta(#[from] DeltaPublishError),

    /// Fatal: the transport failed.
    #[error(transparent)]
    Transport(TransportError),
}

/// Fatal session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The connection carried no workbook id.
    #[error("socket connection with no workbook id")]
    MissingWorkbook,

    /// Resolving the workbook, view, or simulation failed.
    #[error(transparent)]
    Load(#[from] LoaderError),

    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A newer session took over the view.
    #[error("superseded by a newer session for the same view")]
    Superseded,
}

impl SessionError {
    /// Wire category of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingWorkbook => ErrorKind::MissingWorkbook,
            Self::Load(LoaderError::NotFound { .. }) => ErrorKind::NotFound,
            Self::Load(LoaderError::Store(_)) => ErrorKind::StoreError,
            Self::Load(LoaderError::Simulation(_)) => ErrorKind::Simulation,
            Self::Transport(_) => ErrorKind::TransportError,
            Self::Superseded => ErrorKind::Superseded,
        }
    }
}
