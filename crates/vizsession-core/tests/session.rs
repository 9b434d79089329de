//! Session lifecycle scenarios against a scripted simulation.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use common::{
    RecordingTransport, WAIT, current_view, fixture, fixture_with_mask, options, spawn_session,
    wait_until,
};
use tokio::sync::{Mutex, Notify};
use vizsession_core::{
    DeltaDispatcher, MaskError, MaskProvider, MaskedFrame, Ownership, PipelineExit, SceneMask,
    SessionError, SessionState, TickMulticast, Transport,
};
use vizsession_types::{
    ClientMessage, CloseReason, ConnectOptions, ErrorKind, Interaction, ServerMessage, SessionId,
    Tick, View, WorkbookId, paths,
};

#[tokio::test]
async fn workbook_without_view_streams_current_view() {
    let fx = fixture().await;
    let mut session = spawn_session(&fx.ctx, options(Some("wb1")), "s1");
    session.reach(SessionState::Streaming).await;

    let simulation = fx.engine.simulation(&current_view());
    simulation.emit(1);

    match session.next_message().await {
        ServerMessage::Seeded {
            session_id,
            workbook_id,
            view,
            step,
            ..
        } => {
            assert_eq!(session_id, session.session_id);
            assert_eq!(workbook_id.as_str(), "wb1");
            assert_eq!(view.id, current_view());
            assert_eq!(step, 1);
        }
        other => panic!("expected seed, got {other:?}"),
    }

    let delta = session.next_delta().await;
    assert_eq!(delta.step, 1);
    assert_eq!(delta.view_id, current_view());
    let changed: Vec<&str> = delta.paths.iter().map(|p| p.path.as_str()).collect();
    assert!(changed.contains(&paths::SCENE_POINTS_ELEMENTS));
    assert!(changed.contains(&paths::EXPRESSION_TEMPLATES_LENGTH));

    assert_eq!(simulation.attaches.load(Ordering::SeqCst), 1);
    assert_eq!(simulation.attached(), Some(session.session_id.clone()));
    assert!(fx.ctx.caches().vbos.get(&current_view()).await.is_some());
}

#[tokio::test]
async fn missing_workbook_fails_without_touching_caches() {
    let fx = fixture().await;
    let mut session = spawn_session(&fx.ctx, options(None), "s1");

    match session.next_message().await {
        ServerMessage::Error { kind, .. } => assert_eq!(kind, ErrorKind::MissingWorkbook),
        other => panic!("expected error, got {other:?}"),
    }
    let transport = Arc::clone(&session.transport);
    let outcome = session.outcome().await;
    assert_eq!(outcome.error, Some(SessionError::MissingWorkbook));
    assert_eq!(outcome.reason, CloseReason::Error);
    assert_eq!(transport.closed(), Some(CloseReason::Error));

    assert_eq!(fx.ctx.caches().workbooks_by_id.entry_count().await, 0);
    assert_eq!(fx.ctx.caches().n_bodies_by_id.entry_count().await, 0);
    assert_eq!(fx.engine.created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_workbook_is_not_found() {
    let fx = fixture().await;
    let mut session = spawn_session(&fx.ctx, options(Some("nope")), "s1");

    match session.next_message().await {
        ServerMessage::Error { kind, .. } => assert_eq!(kind, ErrorKind::NotFound),
        other => panic!("expected error, got {other:?}"),
    }
    let outcome = session.outcome().await;
    assert!(matches!(outcome.error, Some(SessionError::Load(_))));
    assert!(fx.ctx.bindings.is_empty());
}

#[tokio::test]
async fn newer_session_supersedes_older() {
    let fx = fixture().await;
    let mut first = spawn_session(&fx.ctx, options(Some("wb1")), "s1");
    first.reach(SessionState::Streaming).await;

    let mut second = spawn_session(&fx.ctx, options(Some("wb1")), "s2");
    second.reach(SessionState::Streaming).await;

    match first.next_message().await {
        ServerMessage::Error { kind, .. } => assert_eq!(kind, ErrorKind::Superseded),
        other => panic!("expected supersession notice, got {other:?}"),
    }

    let outcome = first.outcome().await;
    assert_eq!(outcome.reason, CloseReason::Superseded);
    assert_eq!(outcome.error, Some(SessionError::Superseded));
    assert_eq!(
        fx.ctx.bindings.owner(&current_view()),
        Some(second.session_id.clone())
    );

    // The survivor still streams.
    fx.engine.simulation(&current_view()).emit(1);
    assert!(matches!(second.next_message().await, ServerMessage::Seeded { .. }));
    assert_eq!(second.next_delta().await.step, 1);
}

#[tokio::test]
async fn disconnect_frees_binding_and_feedback() {
    let fx = fixture().await;
    let mut session = spawn_session(&fx.ctx, options(Some("wb1")), "s1");
    session.reach(SessionState::Streaming).await;

    let simulation = fx.engine.simulation(&current_view());
    simulation.emit(1);
    assert!(matches!(session.next_message().await, ServerMessage::Seeded { .. }));
    assert_eq!(fx.ctx.bindings.len(), 1);

    let common::Running {
        inbound,
        mut state,
        handle,
        transport,
        ..
    } = session;
    drop(inbound);

    let outcome = tokio::time::timeout(common::WAIT, handle).await.unwrap().unwrap();
    assert_eq!(outcome.reason, CloseReason::ClientDisconnected);
    assert_eq!(outcome.error, None);
    assert_eq!(*state.borrow_and_update(), SessionState::Closed);
    assert!(fx.ctx.bindings.is_empty());
    assert_eq!(simulation.attached(), None);
    assert_eq!(transport.closed(), Some(CloseReason::ClientDisconnected));
}

#[tokio::test]
async fn aborted_session_releases_everything() {
    let fx = fixture().await;
    let mut session = spawn_session(&fx.ctx, options(Some("wb1")), "s1");
    session.reach(SessionState::Streaming).await;
    assert_eq!(fx.ctx.bindings.len(), 1);

    session.handle.abort();
    session.reach(SessionState::Closed).await;

    assert!(fx.ctx.bindings.is_empty());
    let simulation = fx.engine.simulation(&current_view());
    assert_eq!(simulation.releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn renderer_is_seeded_once_and_deltas_stay_ordered() {
    let fx = fixture().await;
    let mut session = spawn_session(&fx.ctx, options(Some("wb1")), "s1");
    session.reach(SessionState::Streaming).await;

    let simulation = fx.engine.simulation(&current_view());
    simulation.emit(1);
    assert!(matches!(session.next_message().await, ServerMessage::Seeded { .. }));
    assert_eq!(session.next_delta().await.step, 1);

    for step in 2..=20 {
        simulation.emit(step);
    }

    let mut last = 1;
    while last < 20 {
        let delta = session.next_delta().await;
        assert!(delta.step > last, "step {} after {last}", delta.step);
        last = delta.step;
    }
    assert_eq!(simulation.attaches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn interactions_are_forwarded_before_first_tick() {
    let fx = fixture().await;
    let mut session = spawn_session(&fx.ctx, options(Some("wb1")), "s1");
    session.reach(SessionState::Streaming).await;
    let simulation = fx.engine.simulation(&current_view());

    // A layout paused by an earlier viewer emits nothing until it hears
    // Resume, so the session must pass it on while still unseeded.
    session
        .inbound
        .send(ClientMessage::Interact {
            interaction: Interaction::Resume,
        })
        .await
        .unwrap();
    // A ping round trip proves the interaction above was handled.
    session.inbound.send(ClientMessage::Ping).await.unwrap();
    assert_eq!(session.next_message().await, ServerMessage::Pong);
    assert_eq!(
        *simulation.interactions.lock().unwrap(),
        vec![Interaction::Resume]
    );

    simulation.emit(1);
    assert!(matches!(session.next_message().await, ServerMessage::Seeded { .. }));
    assert_eq!(session.next_delta().await.step, 1);
}

#[tokio::test]
async fn blocked_pong_does_not_delay_supersession() {
    let fx = fixture().await;
    let first = spawn_session(&fx.ctx, options(Some("wb1")), "s1");
    let mut first_state = first.state.clone();
    tokio::time::timeout(WAIT, first_state.wait_for(|s| *s == SessionState::Streaming))
        .await
        .unwrap()
        .unwrap();

    // The first viewer stops reading right as its pong is written.
    first.transport.hold(|message| matches!(message, ServerMessage::Pong));
    first.inbound.send(ClientMessage::Ping).await.unwrap();
    let stalled = Arc::clone(&first.transport);
    wait_until(|| stalled.parked() == 1).await;

    let mut second = spawn_session(&fx.ctx, options(Some("wb1")), "s2");
    second.reach(SessionState::Streaming).await;

    let common::Running {
        mut messages,
        handle,
        inbound: _keep_open,
        ..
    } = first;
    let outcome = tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
    assert_eq!(outcome.reason, CloseReason::Superseded);
    assert_eq!(*first_state.borrow_and_update(), SessionState::Closed);

    let simulation = fx.engine.simulation(&current_view());
    simulation.emit(1);
    assert!(matches!(second.next_message().await, ServerMessage::Seeded { .. }));
    assert_eq!(second.next_delta().await.step, 1);
    assert_eq!(simulation.attaches.load(Ordering::SeqCst), 1);
    assert_eq!(simulation.attached(), Some(second.session_id.clone()));

    // The superseded viewer only ever heard about the takeover.
    let mut old = Vec::new();
    while let Ok(message) = messages.try_recv() {
        old.push(message);
    }
    assert_eq!(old.len(), 1, "unexpected messages: {old:?}");
    assert!(matches!(
        old[0],
        ServerMessage::Error {
            kind: ErrorKind::Superseded,
            ..
        }
    ));
}

#[tokio::test]
async fn revoked_pipeline_never_attaches_or_publishes() {
    let fx = fixture().await;
    let loaded = fx
        .ctx
        .loader
        .load_views(&[WorkbookId::from("wb1")], None, &ConnectOptions::default())
        .await
        .unwrap()
        .remove(0);
    let simulation = fx.ctx.loader.load_simulation(&loaded).await.unwrap();
    let (transport, mut messages) = RecordingTransport::new();
    let transport: Arc<dyn Transport> = transport;

    let old = SessionId::from("s1");
    let (_old_guard, revoked) = fx.ctx.bindings.bind(loaded.view.id.clone(), old.clone());
    let dispatcher = DeltaDispatcher::new(
        old.clone(),
        loaded.view.clone(),
        Arc::clone(&transport),
        Arc::new(SceneMask),
        Arc::clone(fx.ctx.caches()),
        2,
    );
    let mut pipeline = TickMulticast::start(
        old,
        &loaded,
        simulation,
        transport,
        dispatcher,
        Ownership {
            bindings: fx.ctx.bindings.clone(),
            revoked,
        },
    );

    // Taken over before the first tick arrives.
    let (_new_guard, _) = fx
        .ctx
        .bindings
        .bind(loaded.view.id.clone(), SessionId::from("s2"));
    let scripted = fx.engine.simulation(&current_view());
    scripted.emit(1);

    let exit = tokio::time::timeout(WAIT, pipeline.next_exit()).await.unwrap();
    assert_eq!(exit, Some(PipelineExit::Revoked));
    assert_eq!(scripted.attaches.load(Ordering::SeqCst), 0);
    assert!(messages.try_recv().is_err());
    pipeline.shutdown();
}

#[tokio::test]
async fn slow_viewer_gets_only_the_newest_pending_tick() {
    let fx = fixture().await;
    let mut session = spawn_session(&fx.ctx, options(Some("wb1")), "s1");
    session.reach(SessionState::Streaming).await;

    let simulation = fx.engine.simulation(&current_view());
    simulation.emit(1);
    assert!(matches!(session.next_message().await, ServerMessage::Seeded { .. }));
    assert_eq!(session.next_delta().await.step, 1);

    // Step 2's delta is in flight and stuck on the socket.
    session
        .transport
        .hold(|message| matches!(message, ServerMessage::Delta(_)));
    simulation.emit(2);
    let stalled = Arc::clone(&session.transport);
    wait_until(|| stalled.parked() == 1).await;

    for step in 3..=10 {
        simulation.emit(step);
    }
    // Give the producer time to fold the burst into the pending slot.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.transport.parked(), 1);

    session.transport.release();
    assert_eq!(session.next_delta().await.step, 2);
    assert_eq!(session.next_delta().await.step, 10);

    simulation.emit(11);
    assert_eq!(session.next_delta().await.step, 11);
}

/// Parks mask computations from step 2 on until told to resume.
struct ParkedMask {
    entered: Notify,
    resume: Notify,
}

#[async_trait]
impl MaskProvider for ParkedMask {
    async fn mask(&self, view: &View, tick: &Tick) -> Result<MaskedFrame, MaskError> {
        if tick.step >= 2 {
            self.entered.notify_one();
            self.resume.notified().await;
        }
        SceneMask.mask(view, tick).await
    }
}

#[tokio::test]
async fn disconnect_during_delta_computation_leaks_nothing() {
    let mask = Arc::new(ParkedMask {
        entered: Notify::new(),
        resume: Notify::new(),
    });
    let fx = fixture_with_mask(Arc::clone(&mask) as Arc<dyn MaskProvider>).await;
    let mut session = spawn_session(&fx.ctx, options(Some("wb1")), "s1");
    session.reach(SessionState::Streaming).await;

    let simulation = fx.engine.simulation(&current_view());
    simulation.emit(1);
    assert!(matches!(session.next_message().await, ServerMessage::Seeded { .. }));
    assert_eq!(session.next_delta().await.step, 1);

    simulation.emit(2);
    tokio::time::timeout(WAIT, mask.entered.notified())
        .await
        .unwrap();

    let common::Running {
        inbound,
        mut messages,
        handle,
        ..
    } = session;
    drop(inbound);
    let outcome = tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
    assert_eq!(outcome.reason, CloseReason::ClientDisconnected);

    assert!(fx.ctx.bindings.is_empty());
    assert_eq!(simulation.attached(), None);
    assert_eq!(simulation.releases.load(Ordering::SeqCst), 1);

    // The abandoned computation never reaches the viewer.
    mask.resume.notify_waiters();
    tokio::time::sleep(Duration::from_millis(20)).await;
    while let Ok(message) = messages.try_recv() {
        assert!(!matches!(message, ServerMessage::Delta(_)), "late delta {message:?}");
    }
}

/// Fails every mask computation for one chosen step.
struct FailingStep {
    step: u64,
    calls: Mutex<u32>,
}

#[async_trait]
impl MaskProvider for FailingStep {
    async fn mask(&self, view: &View, tick: &Tick) -> Result<MaskedFrame, MaskError> {
        if tick.step == self.step {
            *self.calls.lock().await += 1;
            return Err(MaskError(String::from("dataframe unavailable")));
        }
        SceneMask.mask(view, tick).await
    }
}

#[tokio::test]
async fn failed_delta_is_followed_by_full_state() {
    let mask = Arc::new(FailingStep {
        step: 2,
        calls: Mutex::new(0),
    });
    let fx = fixture_with_mask(Arc::clone(&mask) as Arc<dyn MaskProvider>).await;
    let mut session = spawn_session(&fx.ctx, options(Some("wb1")), "s1");
    session.reach(SessionState::Streaming).await;

    let simulation = fx.engine.simulation(&current_view());
    simulation.emit(1);
    assert!(matches!(session.next_message().await, ServerMessage::Seeded { .. }));
    let first = session.next_delta().await;
    assert_eq!(first.paths.len(), 4);

    simulation.emit(2);
    // Wait until both attempts at step 2 have failed before moving on.
    tokio::time::timeout(common::WAIT, async {
        while *mask.calls.lock().await < 2 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    simulation.emit(3);
    let recovered = session.next_delta().await;
    assert_eq!(recovered.step, 3);
    assert_eq!(recovered.paths.len(), 4, "delta after a failure carries full state");
    assert_eq!(*session.state.borrow(), SessionState::Streaming);
}

#[tokio::test]
async fn ended_tick_stream_closes_session() {
    let fx = fixture().await;
    let mut session = spawn_session(&fx.ctx, options(Some("wb1")), "s1");
    session.reach(SessionState::Streaming).await;

    fx.engine.simulation(&current_view()).finish();
    let outcome = session.outcome().await;
    assert_eq!(outcome.reason, CloseReason::SimulationEnded);
    assert!(fx.ctx.bindings.is_empty());
}

#[tokio::test]
async fn transport_failure_is_fatal() {
    let fx = fixture().await;
    let mut session = spawn_session(&fx.ctx, options(Some("wb1")), "s1");
    session.reach(SessionState::Streaming).await;

    session.transport.failing.store(true, Ordering::SeqCst);
    fx.engine.simulation(&current_view()).emit(1);

    let outcome = session.outcome().await;
    assert_eq!(outcome.reason, CloseReason::Error);
    assert!(matches!(outcome.error, Some(SessionError::Transport(_))));
    assert!(fx.ctx.bindings.is_empty());
}
