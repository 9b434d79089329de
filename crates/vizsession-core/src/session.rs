//! Session lifecycle.
//!
//! ```text
//! connecting --load + bind--> seeded --wire multicast--> streaming
//!      |                         |                           |
//!      +-------------------------+------------> closed <-----+
//! ```
//!
//! Every transition into `closed` releases the view binding, the render
//! feedback attachment, and the pipeline tasks, including when the
//! session future is dropped at an await point.

use std::slice;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use vizsession_loader::{Caches, DocumentKind, DocumentLoader, LoaderError, SimulationRef};
use vizsession_types::{
    ClientMessage, CloseReason, ConnectOptions, ServerMessage, SessionId,
};

use crate::binding::BindingRegistry;
use crate::config::SessionConfig;
use crate::dispatcher::DeltaDispatcher;
use crate::error::SessionError;
use crate::mask::MaskProvider;
use crate::multicast::{Ownership, PipelineExit, TickMulticast};
use crate::transport::Transport;

/// How long a closing session waits to deliver its error notice.
const NOTICE_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Resolving the workbook and view.
    Connecting,
    /// Bound to the view's simulation.
    Seeded,
    /// Tick multicast is running.
    Streaming,
    /// Terminal. Every resource has been released.
    Closed,
}

/// Process-wide collaborators shared by every session.
pub struct SessionContext {
    /// Resolves workbooks, views, and simulations.
    pub loader: DocumentLoader,
    /// View ownership.
    pub bindings: BindingRegistry,
    /// Computes the viewer-visible frame of each tick.
    pub mask: Arc<dyn MaskProvider>,
    /// Pipeline settings.
    pub config: SessionConfig,
}

impl SessionContext {
    /// Bundle the session collaborators.
    pub fn new(
        loader: DocumentLoader,
        bindings: BindingRegistry,
        mask: Arc<dyn MaskProvider>,
        config: SessionConfig,
    ) -> Self {
        Self {
            loader,
            bindings,
            mask,
            config,
        }
    }

    /// The cache registry behind the loader.
    pub const fn caches(&self) -> &Arc<Caches> {
        self.loader.caches()
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    /// The session.
    pub session_id: SessionId,
    /// Close reason reported to the viewer.
    pub reason: CloseReason,
    /// The fatal error, if one ended the session.
    pub error: Option<SessionError>,
}

/// One viewer connection's session.
pub struct Session {
    id: SessionId,
    options: ConnectOptions,
    transport: Arc<dyn Transport>,
    state: watch::Sender<SessionState>,
}

impl Session {
    /// Create a session in the `connecting` state.
    pub fn new(id: SessionId, options: ConnectOptions, transport: Arc<dyn Transport>) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            id,
            options,
            transport,
            state,
        }
    }

    /// The session id.
    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    /// Observe lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Drive the session until the viewer disconnects, a newer session
    /// supersedes it, the tick stream ends, or a fatal error occurs.
    ///
    /// `inbound` carries the viewer's messages; its closing is the
    /// disconnect signal. Fatal errors are sent to the viewer as
    /// [`ServerMessage::Error`] before the transport closes.
    pub async fn run(
        self,
        ctx: Arc<SessionContext>,
        inbound: mpsc::Receiver<ClientMessage>,
    ) -> SessionOutcome {
        let Self {
            id,
            options,
            transport,
            state,
        } = self;
        let state = ClosedOnDrop(state);

        let result = drive(&id, &options, &transport, &ctx, &state.0, inbound).await;
        let (reason, error) = match result {
            Ok(reason) => {
                info!(session_id = %id, reason = ?reason, "Session closed");
                (reason, None)
            }
            Err(e) => {
                warn!(session_id = %id, error = %e, "Session failed");
                let reason = match e {
                    SessionError::Superseded => CloseReason::Superseded,
                    _ => CloseReason::Error,
                };
                if !matches!(e, SessionError::Transport(_)) {
                    let notice = ServerMessage::Error {
                        kind: e.kind(),
                        message: e.to_string(),
                    };
                    match tokio::time::timeout(NOTICE_TIMEOUT, transport.send(&notice)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(send_err)) => {
                            debug!(session_id = %id, error = %send_err, "Error notice not delivered");
                        }
                        Err(_elapsed) => debug!(session_id = %id, "Error notice timed out"),
                    }
                }
                (reason, Some(e))
            }
        };

        transport.close(reason).await;
        drop(state);

        SessionOutcome {
            session_id: id,
            reason,
            error,
        }
    }
}

async fn drive(
    id: &SessionId,
    options: &ConnectOptions,
    transport: &Arc<dyn Transport>,
    ctx: &SessionContext,
    state: &watch::Sender<SessionState>,
    mut inbound: mpsc::Receiver<ClientMessage>,
) -> Result<CloseReason, SessionError> {
    let workbook_id = options
        .workbook
        .clone()
        .ok_or(SessionError::MissingWorkbook)?;
    let requested = options.view.as_ref().map(slice::from_ref);
    let loaded = ctx
        .loader
        .load_views(slice::from_ref(&workbook_id), requested, options)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| LoaderError::NotFound {
            kind: DocumentKind::View,
            id: options.view.as_ref().map_or_else(String::new, ToString::to_string),
        })?;
    let simulation = ctx.loader.load_simulation(&loaded).await?;

    let (_binding, mut revoked) = ctx.bindings.bind(loaded.view.id.clone(), id.clone());
    let _feedback = FeedbackRelease {
        simulation: Arc::clone(&simulation),
        session_id: id.clone(),
    };
    state.send_replace(SessionState::Seeded);
    info!(
        session_id = %id,
        workbook_id = %workbook_id,
        view_id = %loaded.view.id,
        "Session bound to view"
    );

    let dispatcher = DeltaDispatcher::new(
        id.clone(),
        loaded.view.clone(),
        Arc::clone(transport),
        Arc::clone(&ctx.mask),
        Arc::clone(ctx.caches()),
        ctx.config.max_delta_attempts,
    );
    let mut pipeline = TickMulticast::start(
        id.clone(),
        &loaded,
        Arc::clone(&simulation),
        Arc::clone(transport),
        dispatcher,
        Ownership {
            bindings: ctx.bindings.clone(),
            revoked: revoked.clone(),
        },
    );
    state.send_replace(SessionState::Streaming);

    // Every arm completes without awaiting the transport, so revocation
    // and disconnects are observed however slow the viewer is.
    loop {
        tokio::select! {
            () = revoked.wait() => return Err(SessionError::Superseded),
            message = inbound.recv() => match message {
                Some(ClientMessage::Interact { interaction }) => {
                    if let Err(e) = simulation.interact(interaction) {
                        warn!(session_id = %id, view_id = %loaded.view.id, error = %e, "Interaction rejected");
                    }
                }
                Some(ClientMessage::Ping) => pipeline.pong(),
                None => return Ok(CloseReason::ClientDisconnected),
            },
            Some(exit) = pipeline.next_exit() => match exit {
                PipelineExit::Seeded | PipelineExit::Stopped => {}
                PipelineExit::Revoked => return Err(SessionError::Superseded),
                PipelineExit::UpstreamClosed => return Ok(CloseReason::SimulationEnded),
                PipelineExit::Transport(e) => return Err(e.into()),
                PipelineExit::Panicked(message) => {
                    warn!(session_id = %id, view_id = %loaded.view.id, error = %message, "Pipeline task panicked");
                    return Ok(CloseReason::Error);
                }
            },
        }
    }
}

/// Marks the session closed when dropped, after every other resource.
struct ClosedOnDrop(watch::Sender<SessionState>);

impl Drop for ClosedOnDrop {
    fn drop(&mut self) {
        self.0.send_replace(SessionState::Closed);
    }
}

/// Detaches the session's render feedback from the simulation when dropped.
struct FeedbackRelease {
    simulation: SimulationRef,
    session_id: SessionId,
}

impl Drop for FeedbackRelease {
    fn drop(&mut self) {
        self.simulation.release(&self.session_id);
    }
}

