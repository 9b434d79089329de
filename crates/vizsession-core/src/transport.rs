//! Outbound side of a viewer connection.

use async_trait::async_trait;
use vizsession_types::{CloseReason, ServerMessage};

use crate::error::TransportError;

/// A bidirectional connection's outbound half.
///
/// `send` resolves once the message has been handed to the socket, so a
/// caller that awaits it observes socket backpressure. Inbound messages
/// reach the session through a channel owned by the transport's reader.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one message.
    async fn send(&self, message: &ServerMessage) -> Result<(), TransportError>;

    /// Close the connection. Idempotent.
    async fn close(&self, reason: CloseReason);
}
