//! `WebSocket` transport.
//!
//! Each connection to `GET /socket?workbook=...&view=...` runs one
//! [`Session`]. The socket is split: the write half becomes the session's
//! [`Transport`], and a reader task parses inbound frames into
//! [`ClientMessage`]s. When the reader stops (close frame, socket error)
//! it drops its channel sender, which the session observes as the
//! viewer's disconnect.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use vizsession_core::{Session, Transport, TransportError};
use vizsession_types::{ClientMessage, CloseReason, ConnectOptions, ServerMessage, SessionId};

use crate::state::AppState;

/// Upgrade to a `WebSocket` and run a session on it.
///
/// # Route
///
/// `GET /socket`
pub async fn socket(
    ws: WebSocketUpgrade,
    Query(query): Query<BTreeMap<String, String>>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let options = ConnectOptions::from_query(query);
    ws.on_upgrade(move |socket| handle_socket(socket, options, state))
}

async fn handle_socket(socket: WebSocket, options: ConnectOptions, state: Arc<AppState>) {
    let _connection = state.track_connection();
    let session_id = SessionId::generate();
    info!(
        session_id = %session_id,
        workbook_id = options.workbook.as_ref().map_or("", |id| id.as_str()),
        view_id = options.view.as_ref().map_or("", |id| id.as_str()),
        "Socket connected"
    );

    let (sink, stream) = socket.split();
    let transport = Arc::new(WsTransport::new(sink));
    let (inbound_tx, inbound_rx) = mpsc::channel(state.sessions.config.inbound_buffer);
    let reader = tokio::spawn(read_frames(stream, inbound_tx, session_id.clone()));

    let session = Session::new(session_id, options, transport);
    let outcome = session.run(Arc::clone(&state.sessions), inbound_rx).await;
    reader.abort();

    debug!(session_id = %outcome.session_id, reason = ?outcome.reason, "Socket handler finished");
}

async fn read_frames(
    mut stream: SplitStream<WebSocket>,
    inbound: mpsc::Sender<ClientMessage>,
    session_id: SessionId,
) {
    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "Socket read failed");
                break;
            }
        };
        match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(message) => {
                if inbound.send(message).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Unparseable client message ignored");
            }
        }
    }
    debug!(session_id = %session_id, "Socket reader stopped");
}

/// The write half of a viewer socket.
pub struct WsTransport {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    closed: AtomicBool,
}

impl WsTransport {
    /// Wrap a socket's write half.
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, message: &ServerMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let json = serde_json::to_string(message).map_err(|e| TransportError::Encode(e.to_string()))?;
        self.sink
            .lock()
            .await
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&self, reason: CloseReason) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut sink = self.sink.lock().await;
        if let Ok(json) = serde_json::to_string(&ServerMessage::Closed { reason }) {
            let _ = sink.send(Message::Text(json.into())).await;
        }
        if let Err(e) = sink.close().await {
            debug!(error = %e, "Socket close failed");
        }
    }
}
