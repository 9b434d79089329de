//! Tick multicast: one upstream subscription, two consumers.
//!
//! The producer task owns the session's only subscription to the view's
//! tick stream. The first tick goes to the seed consumer through a
//! oneshot, so the renderer is seeded exactly once. Every tick, the first
//! included, is published to a watch channel that the diff consumer reads
//! once seeding is complete. A diff consumer that falls behind sees only
//! the newest tick; intermediate ticks are superseded, never reordered.
//!
//! Replies to viewer pings are written by a fourth task, so no transport
//! write ever runs on the session loop. Once the session's binding is
//! revoked the seed task no longer attaches and the diff task stops
//! publishing, even before the session loop tears the pipeline down.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use vizsession_loader::{LoadedView, SimulationRef};
use vizsession_types::{ServerMessage, SessionId, Tick, View, WorkbookId};

use crate::binding::{BindingRegistry, Revoked};
use crate::dispatcher::DeltaDispatcher;
use crate::error::{DispatchError, TransportError};
use crate::transport::Transport;

/// Why a pipeline task finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineExit {
    /// The renderer was seeded. The seed consumer's job is done.
    Seeded,
    /// The task stopped because a sibling task ended first.
    Stopped,
    /// The session lost its view binding.
    Revoked,
    /// The simulation's tick stream ended.
    UpstreamClosed,
    /// The transport failed.
    Transport(TransportError),
    /// The task panicked.
    Panicked(String),
}

/// The running tasks of one session's tick pipeline.
///
/// Dropping the multicast aborts every task.
pub struct TickMulticast {
    tasks: JoinSet<PipelineExit>,
    pings: mpsc::Sender<()>,
}

/// The binding a pipeline publishes under.
pub struct Ownership {
    /// Registry holding the binding.
    pub bindings: BindingRegistry,
    /// Fires once the binding is gone.
    pub revoked: Revoked,
}

impl TickMulticast {
    /// Subscribe to `simulation` and spawn the producer, seed, diff, and
    /// pong tasks.
    pub fn start(
        session_id: SessionId,
        loaded: &LoadedView,
        simulation: SimulationRef,
        transport: Arc<dyn Transport>,
        dispatcher: DeltaDispatcher,
        ownership: Ownership,
    ) -> Self {
        // Subscribe before spawning so no tick falls between setup and the
        // producer's first poll.
        let upstream = simulation.ticks();
        let (seed_tx, seed_rx) = oneshot::channel();
        let (latest_tx, latest_rx) = watch::channel(None);
        let (seeded_tx, seeded_rx) = watch::channel(false);
        let (pings, pings_rx) = mpsc::channel(1);

        let mut tasks = JoinSet::new();
        tasks.spawn(produce(upstream, seed_tx, latest_tx, session_id.clone()));
        tasks.spawn(seed(
            seed_rx,
            simulation,
            Arc::clone(&transport),
            seeded_tx,
            Seed {
                session_id: session_id.clone(),
                workbook_id: loaded.workbook.id.clone(),
                view: loaded.view.clone(),
                bindings: ownership.bindings,
            },
        ));
        tasks.spawn(diff(
            dispatcher,
            latest_rx,
            seeded_rx,
            ownership.revoked,
            session_id,
        ));
        tasks.spawn(pong(pings_rx, transport));

        Self { tasks, pings }
    }

    /// Queue a reply to a viewer ping.
    ///
    /// Pings arriving while a reply is still pending share that reply.
    pub fn pong(&self) {
        match self.pings.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Closed(())) => debug!("Pong task already stopped"),
        }
    }

    /// Wait for the next task to finish. `None` once every task has.
    pub async fn next_exit(&mut self) -> Option<PipelineExit> {
        let joined = self.tasks.join_next().await?;
        Some(joined.unwrap_or_else(|e| PipelineExit::Panicked(e.to_string())))
    }

    /// Abort every task.
    pub fn shutdown(&mut self) {
        self.tasks.abort_all();
    }
}

struct Seed {
    session_id: SessionId,
    workbook_id: WorkbookId,
    view: View,
    bindings: BindingRegistry,
}

async fn produce(
    mut upstream: broadcast::Receiver<Arc<Tick>>,
    seed: oneshot::Sender<Arc<Tick>>,
    latest: watch::Sender<Option<Arc<Tick>>>,
    session_id: SessionId,
) -> PipelineExit {
    let mut seed = Some(seed);
    loop {
        match upstream.recv().await {
            Ok(tick) => {
                if let Some(seed) = seed.take() {
                    let _ = seed.send(Arc::clone(&tick));
                }
                latest.send_replace(Some(tick));
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!(session_id = %session_id, skipped, "Tick producer lagged");
            }
            Err(RecvError::Closed) => {
                info!(session_id = %session_id, "Tick stream ended");
                return PipelineExit::UpstreamClosed;
            }
        }
    }
}

async fn seed(
    first: oneshot::Receiver<Arc<Tick>>,
    simulation: SimulationRef,
    transport: Arc<dyn Transport>,
    seeded: watch::Sender<bool>,
    target: Seed,
) -> PipelineExit {
    let Ok(tick) = first.await else {
        return PipelineExit::Stopped;
    };

    let view_id = &target.view.id;
    let attached = target.bindings.with_owner(view_id, &target.session_id, || {
        simulation.attach_render_feedback(&target.session_id, &tick);
    });
    if attached.is_none() {
        debug!(session_id = %target.session_id, view_id = %view_id, "Binding revoked before seed");
        return PipelineExit::Revoked;
    }

    let message = ServerMessage::Seeded {
        session_id: target.session_id.clone(),
        workbook_id: target.workbook_id,
        view: target.view,
        render_config: simulation.render_config(),
        step: tick.step,
    };

    match transport.send(&message).await {
        Ok(()) => {
            seeded.send_replace(true);
            info!(
                session_id = %target.session_id,
                view_id = %tick.view_id,
                step = tick.step,
                "Renderer seeded"
            );
            PipelineExit::Seeded
        }
        Err(e) => PipelineExit::Transport(e),
    }
}

async fn diff(
    mut dispatcher: DeltaDispatcher,
    mut latest: watch::Receiver<Option<Arc<Tick>>>,
    mut seeded: watch::Receiver<bool>,
    mut revoked: Revoked,
    session_id: SessionId,
) -> PipelineExit {
    if seeded.wait_for(|seeded| *seeded).await.is_err() {
        return PipelineExit::Stopped;
    }

    loop {
        tokio::select! {
            () = revoked.wait() => return PipelineExit::Revoked,
            changed = latest.changed() => {
                if changed.is_err() {
                    return PipelineExit::Stopped;
                }
            }
        }
        let current = latest.borrow_and_update().clone();
        let Some(tick) = current else {
            continue;
        };
        if revoked.is_revoked() {
            return PipelineExit::Revoked;
        }

        match dispatcher.dispatch(&tick).await {
            Ok(_) => {}
            Err(DispatchError::Delta(e)) => {
                warn!(
                    session_id = %session_id,
                    view_id = %tick.view_id,
                    error = %e,
                    "Delta publish failed, next delta carries full state"
                );
            }
            Err(DispatchError::Transport(e)) => return PipelineExit::Transport(e),
        }
    }
}

async fn pong(mut pings: mpsc::Receiver<()>, transport: Arc<dyn Transport>) -> PipelineExit {
    while pings.recv().await.is_some() {
        if let Err(e) = transport.send(&ServerMessage::Pong).await {
            return PipelineExit::Transport(e);
        }
    }
    PipelineExit::Stopped
}
