//! Exclusive view bindings.
//!
//! At most one session is bound to a view at any time. Binding a view that
//! is already bound swaps the owner under one lock and signals the previous
//! owner through its [`Revoked`] signal, so both sessions agree on who
//! owns the view the moment `bind` returns. Work that must only happen
//! while a session owns its view runs under the same lock through
//! [`BindingRegistry::with_owner`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};
use vizsession_types::{SessionId, ViewId};

/// Fires when a newer session takes over the binding, or when the
/// registry forgets it.
///
/// Clones observe the same signal, so the session loop and each of its
/// pipeline tasks can hold one.
#[derive(Clone)]
pub struct Revoked(watch::Receiver<bool>);

impl Revoked {
    /// Whether the binding is gone.
    pub fn is_revoked(&self) -> bool {
        *self.0.borrow() || self.0.has_changed().is_err()
    }

    /// Wait until the binding is gone.
    pub async fn wait(&mut self) {
        // An error means the registry dropped the entry.
        let _ = self.0.wait_for(|revoked| *revoked).await;
    }
}

/// A live binding as reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    /// The bound view.
    pub view_id: ViewId,
    /// The owning session.
    pub session_id: SessionId,
    /// When the session took the view.
    pub bound_at: DateTime<Utc>,
}

struct Entry {
    session_id: SessionId,
    bound_at: DateTime<Utc>,
    revoke: watch::Sender<bool>,
}

/// Process-wide map from view to its owning session.
#[derive(Clone, Default)]
pub struct BindingRegistry {
    inner: Arc<Mutex<HashMap<ViewId, Entry>>>,
}

impl BindingRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ViewId, Entry>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `view_id` to `session_id`, superseding any current owner.
    ///
    /// The binding lasts until the returned guard is dropped.
    pub fn bind(&self, view_id: ViewId, session_id: SessionId) -> (BindingGuard, Revoked) {
        let (revoke, revoked) = watch::channel(false);
        let previous = self.lock().insert(
            view_id.clone(),
            Entry {
                session_id: session_id.clone(),
                bound_at: Utc::now(),
                revoke,
            },
        );

        if let Some(previous) = previous {
            info!(
                view_id = %view_id,
                session_id = %session_id,
                superseded = %previous.session_id,
                "View binding superseded"
            );
            previous.revoke.send_replace(true);
        } else {
            debug!(view_id = %view_id, session_id = %session_id, "View bound");
        }

        let guard = BindingGuard {
            registry: self.clone(),
            view_id,
            session_id,
        };
        (guard, Revoked(revoked))
    }

    /// The session currently bound to `view_id`.
    pub fn owner(&self, view_id: &ViewId) -> Option<SessionId> {
        self.lock().get(view_id).map(|entry| entry.session_id.clone())
    }

    /// Run `f` while holding the registry lock, but only if `session_id`
    /// still owns `view_id`.
    ///
    /// A concurrent [`bind`](Self::bind) either completes before `f` runs,
    /// in which case `f` is skipped, or waits until `f` has returned.
    pub fn with_owner<R>(
        &self,
        view_id: &ViewId,
        session_id: &SessionId,
        f: impl FnOnce() -> R,
    ) -> Option<R> {
        let bindings = self.lock();
        bindings
            .get(view_id)
            .is_some_and(|entry| &entry.session_id == session_id)
            .then(f)
    }

    /// All live bindings, ordered by view id.
    pub fn active(&self) -> Vec<Binding> {
        let mut bindings: Vec<Binding> = self
            .lock()
            .iter()
            .map(|(view_id, entry)| Binding {
                view_id: view_id.clone(),
                session_id: entry.session_id.clone(),
                bound_at: entry.bound_at,
            })
            .collect();
        bindings.sort_by(|a, b| a.view_id.cmp(&b.view_id));
        bindings
    }

    /// Number of live bindings.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no view is bound.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every binding. Every owner observes its [`Revoked`] signal.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn release(&self, view_id: &ViewId, session_id: &SessionId) {
        let mut bindings = self.lock();
        if bindings
            .get(view_id)
            .is_some_and(|entry| &entry.session_id == session_id)
        {
            bindings.remove(view_id);
            debug!(view_id = %view_id, session_id = %session_id, "View binding released");
        }
    }
}

/// Holds a binding for as long as it lives.
///
/// Dropping the guard frees the view only if this session still owns it;
/// a superseded session's guard leaves the newer binding alone.
pub struct BindingGuard {
    registry: BindingRegistry,
    view_id: ViewId,
    session_id: SessionId,
}

impl Drop for BindingGuard {
    fn drop(&mut self) {
        self.registry.release(&self.view_id, &self.session_id);
    }
}
