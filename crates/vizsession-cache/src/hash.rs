//! BLAKE3 content addresses for the artifact cache.

use core::fmt;

use crate::error::CacheError;

/// Content address of an artifact: the BLAKE3 digest of its bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(blake3::Hash);

impl ContentHash {
    /// Hash `bytes`.
    pub fn of(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes))
    }

    /// Parse a 64-character hex digest.
    pub fn from_hex(hex: &str) -> Result<Self, CacheError> {
        blake3::Hash::from_hex(hex)
            .map(Self)
            .map_err(|e| CacheError::InvalidHash(format!("{hex}: {e}")))
    }

    /// Hex representation of the digest.
    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}
