//! Error types for the worker binary.

use vizsession_loader::StoreError;
use vizsession_server::ServerError;

use crate::config::ConfigError;

/// Top-level error for the worker binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The backing store could not be opened.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },

    /// The HTTP server failed.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: ServerError,
    },

    /// The server task ended abnormally.
    #[error("server task failed: {message}")]
    Join {
        /// Description of the failure.
        message: String,
    },
}
