//! Live layout simulation handle and its stepping task.
//!
//! The handle owns the sending half of the interaction queue; when the
//! last handle is dropped (for example when `nBodiesById` evicts it) the
//! queue closes and the stepping task exits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};
use vizsession_loader::{Simulation, SimulationError};
use vizsession_types::{Interaction, RenderConfig, SessionId, Tick, ViewId};

use crate::layout::ForceLayout;

/// Lower bound for the runtime-adjustable tick interval.
const MIN_TICK_INTERVAL_MS: u64 = 5;

/// Handle to one view's running layout.
#[derive(Debug)]
pub struct LayoutSimulation {
    view_id: ViewId,
    ticks: broadcast::Sender<Arc<Tick>>,
    interactions: mpsc::UnboundedSender<Interaction>,
    render_config: RenderConfig,
    attached: Mutex<Option<SessionId>>,
    seeded_step: AtomicU64,
}

impl LayoutSimulation {
    /// Spawn the stepping task for `layout` and return its handle.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        view_id: ViewId,
        layout: ForceLayout,
        render_config: RenderConfig,
        tick_interval_ms: u64,
        tick_buffer: usize,
    ) -> Arc<Self> {
        let (ticks, _) = broadcast::channel(tick_buffer.max(1));
        let (interactions, rx) = mpsc::unbounded_channel();

        tokio::spawn(run_layout(
            view_id.clone(),
            layout,
            ticks.clone(),
            rx,
            tick_interval_ms.max(MIN_TICK_INTERVAL_MS),
        ));

        info!(
            view_id = %view_id,
            tick_interval_ms,
            "Layout task spawned"
        );

        Arc::new(Self {
            view_id,
            ticks,
            interactions,
            render_config,
            attached: Mutex::new(None),
            seeded_step: AtomicU64::new(0),
        })
    }

    /// The session whose render feedback is attached, if any.
    pub fn attached_session(&self) -> Option<SessionId> {
        self.attached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Step the most recent render feedback attach was seeded with.
    pub fn seeded_step(&self) -> u64 {
        self.seeded_step.load(Ordering::Acquire)
    }
}

impl Simulation for LayoutSimulation {
    fn view_id(&self) -> &ViewId {
        &self.view_id
    }

    fn ticks(&self) -> broadcast::Receiver<Arc<Tick>> {
        self.ticks.subscribe()
    }

    fn interact(&self, interaction: Interaction) -> Result<(), SimulationError> {
        self.interactions
            .send(interaction)
            .map_err(|_closed| SimulationError::Stopped(self.view_id.clone()))
    }

    fn render_config(&self) -> RenderConfig {
        self.render_config.clone()
    }

    fn attach_render_feedback(&self, session: &SessionId, tick: &Tick) {
        let mut attached = self.attached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = attached.replace(session.clone()) {
            debug!(view_id = %self.view_id, previous = %previous, "Render feedback reassigned");
        }
        self.seeded_step.store(tick.step, Ordering::Release);
        debug!(view_id = %self.view_id, session_id = %session, step = tick.step, "Render feedback attached");
    }

    fn release(&self, session: &SessionId) {
        let mut attached = self.attached.lock().unwrap_or_else(PoisonError::into_inner);
        if attached.as_ref() == Some(session) {
            *attached = None;
            debug!(view_id = %self.view_id, session_id = %session, "Render feedback released");
        }
    }
}

/// Step `layout` every `interval_ms` until the interaction queue closes.
async fn run_layout(
    view_id: ViewId,
    mut layout: ForceLayout,
    ticks: broadcast::Sender<Arc<Tick>>,
    mut interactions: mpsc::UnboundedReceiver<Interaction>,
    mut interval_ms: u64,
) {
    let mut step: u64 = 0;
    let mut paused = false;

    loop {
        tokio::select! {
            biased;

            interaction = interactions.recv() => {
                match interaction {
                    Some(Interaction::Pause) => paused = true,
                    Some(Interaction::Resume) => paused = false,
                    Some(Interaction::Nudge { point, dx, dy }) => layout.nudge(point, dx, dy),
                    Some(Interaction::SetTickInterval { ms }) => {
                        interval_ms = ms.max(MIN_TICK_INTERVAL_MS);
                    }
                    None => break,
                }
            }

            () = tokio::time::sleep(Duration::from_millis(interval_ms)), if !paused => {
                layout.step();
                step = step.saturating_add(1);
                let tick = Tick {
                    view_id: view_id.clone(),
                    step,
                    point_count: layout.point_count(),
                    edge_count: layout.edge_count(),
                    buffers: layout.buffers(),
                    produced_at: Utc::now(),
                };
                // send fails only when nobody is subscribed, which is
                // normal between sessions.
                let _ = ticks.send(Arc::new(tick));
            }
        }
    }

    info!(view_id = %view_id, steps = step, "Layout task stopped");
}
