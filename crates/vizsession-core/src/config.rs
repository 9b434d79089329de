//! Session pipeline settings.

use serde::Deserialize;

/// Per-session pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Attempts at computing one tick's delta before it is given up on.
    #[serde(default = "default_max_delta_attempts")]
    pub max_delta_attempts: u32,
    /// Capacity of the inbound client message queue.
    #[serde(default = "default_inbound_buffer")]
    pub inbound_buffer: usize,
}

const fn default_max_delta_attempts() -> u32 {
    2
}

const fn default_inbound_buffer() -> usize {
    64
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_delta_attempts: default_max_delta_attempts(),
            inbound_buffer: default_inbound_buffer(),
        }
    }
}
