//! Per-tick delta computation and publication.

use std::sync::Arc;

use tracing::{debug, warn};
use vizsession_loader::Caches;
use vizsession_types::{Delta, PathValue, ServerMessage, SessionId, Tick, VboSet, View};

use crate::error::{DeltaPublishError, DispatchError, TransportError};
use crate::mask::{MaskProvider, MaskedFrame};
use crate::transport::Transport;

/// Diffs masked frames against the last frame the viewer received and
/// sends the difference.
///
/// The baseline only advances after a successful send. A tick whose delta
/// fails clears it, so the next delta carries full state.
pub struct DeltaDispatcher {
    session_id: SessionId,
    view: View,
    transport: Arc<dyn Transport>,
    mask: Arc<dyn MaskProvider>,
    caches: Arc<Caches>,
    baseline: MaskedFrame,
    max_attempts: u32,
}

impl DeltaDispatcher {
    /// Create a dispatcher for one session's view.
    pub fn new(
        session_id: SessionId,
        view: View,
        transport: Arc<dyn Transport>,
        mask: Arc<dyn MaskProvider>,
        caches: Arc<Caches>,
        max_attempts: u32,
    ) -> Self {
        Self {
            session_id,
            view,
            transport,
            mask,
            caches,
            baseline: MaskedFrame::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Publish the delta for one tick.
    ///
    /// Returns the delta that was sent, or `None` when nothing changed.
    /// The tick's buffers are recorded in the `vbos` cache either way.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Delta`] when this tick's delta was lost; the
    /// session should carry on. [`DispatchError::Transport`] when the
    /// connection failed.
    pub async fn dispatch(&mut self, tick: &Tick) -> Result<Option<Delta>, DispatchError> {
        let frame = match self.mask_with_retry(tick).await {
            Ok(frame) => frame,
            Err(e) => {
                self.baseline.clear();
                return Err(e.into());
            }
        };

        self.caches
            .vbos
            .put(self.view.id.clone(), Arc::new(VboSet::from_tick(tick)))
            .await;

        let paths = diff(&self.baseline, &frame);
        if paths.is_empty() {
            debug!(session_id = %self.session_id, step = tick.step, "No changes to publish");
            return Ok(None);
        }

        let delta = Delta {
            view_id: self.view.id.clone(),
            step: tick.step,
            paths,
        };
        match self.transport.send(&ServerMessage::Delta(delta.clone())).await {
            Ok(()) => {
                self.baseline = frame;
                Ok(Some(delta))
            }
            Err(TransportError::Encode(message)) => {
                self.baseline.clear();
                Err(DeltaPublishError::Encode {
                    step: tick.step,
                    message,
                }
                .into())
            }
            Err(e) => Err(DispatchError::Transport(e)),
        }
    }

    async fn mask_with_retry(&self, tick: &Tick) -> Result<MaskedFrame, DeltaPublishError> {
        let mut attempt = 1;
        loop {
            match self.mask.mask(&self.view, tick).await {
                Ok(frame) => return Ok(frame),
                Err(e) if attempt < self.max_attempts => {
                    warn!(
                        session_id = %self.session_id,
                        view_id = %self.view.id,
                        step = tick.step,
                        attempt,
                        error = %e,
                        "Mask computation failed, retrying"
                    );
                    attempt = attempt.saturating_add(1);
                }
                Err(e) => {
                    return Err(DeltaPublishError::Mask {
                        step: tick.step,
                        message: e.0,
                    });
                }
            }
        }
    }
}

/// Paths whose value in `next` differs from `previous`, in path order.
fn diff(previous: &MaskedFrame, next: &MaskedFrame) -> Vec<PathValue> {
    next.iter()
        .filter(|(path, value)| previous.get(*path) != Some(*value))
        .map(|(path, value)| PathValue {
            path: path.clone(),
            value: value.clone(),
        })
        .collect()
}
