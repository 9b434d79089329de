//! Error types for the cache registry.

/// Errors raised by cache registry helpers.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A content hash string was not a valid BLAKE3 hex digest.
    #[error("invalid content hash: {0}")]
    InvalidHash(String),
}
