//! Shared fixtures: a scripted simulation whose ticks the test emits by
//! hand, and a transport that records every outbound message.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use vizsession_cache::{CacheConfig, CacheRegistry, ContentHash, Store};
use vizsession_core::{
    BindingRegistry, MaskProvider, SceneMask, Session, SessionConfig, SessionContext,
    SessionOutcome, SessionState, Transport, TransportError,
};
use vizsession_loader::{
    DocumentLoader, LayoutConfig, MemoryStore, Simulation, SimulationEngine, SimulationError,
    SimulationRef,
};
use vizsession_types::{
    ClientMessage, CloseReason, ConnectOptions, Dataset, Interaction, RenderConfig,
    ServerMessage, SessionId, Tick, View, ViewId, Workbook, WorkbookId,
};

pub const WAIT: Duration = Duration::from_secs(5);

/// Poll `condition` until it holds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never held");
}

pub fn current_view() -> ViewId {
    ViewId::from("wb1:view:0")
}

pub struct ScriptedSimulation {
    view_id: ViewId,
    ticks: Mutex<Option<broadcast::Sender<Arc<Tick>>>>,
    attached: Mutex<Option<SessionId>>,
    pub attaches: AtomicUsize,
    pub releases: AtomicUsize,
    pub interactions: Mutex<Vec<Interaction>>,
}

impl ScriptedSimulation {
    fn new(view_id: ViewId) -> Self {
        let (ticks, _) = broadcast::channel(64);
        Self {
            view_id,
            ticks: Mutex::new(Some(ticks)),
            attached: Mutex::new(None),
            attaches: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            interactions: Mutex::new(Vec::new()),
        }
    }

    /// Emit a tick at `step`. The point count follows the step so every
    /// tick changes at least two paths.
    pub fn emit(&self, step: u64) {
        let tick = Tick {
            view_id: self.view_id.clone(),
            step,
            point_count: u32::try_from(step).unwrap(),
            edge_count: 4,
            buffers: BTreeMap::from([(String::from("curPoints"), vec![0_u8; 8])]),
            produced_at: Utc::now(),
        };
        if let Some(ticks) = self.ticks.lock().unwrap().as_ref() {
            let _ = ticks.send(Arc::new(tick));
        }
    }

    /// End the tick stream.
    pub fn finish(&self) {
        self.ticks.lock().unwrap().take();
    }

    pub fn attached(&self) -> Option<SessionId> {
        self.attached.lock().unwrap().clone()
    }
}

impl Simulation for ScriptedSimulation {
    fn view_id(&self) -> &ViewId {
        &self.view_id
    }

    fn ticks(&self) -> broadcast::Receiver<Arc<Tick>> {
        if let Some(ticks) = self.ticks.lock().unwrap().as_ref() {
            return ticks.subscribe();
        }
        let (closed, receiver) = broadcast::channel(1);
        drop(closed);
        receiver
    }

    fn interact(&self, interaction: Interaction) -> Result<(), SimulationError> {
        self.interactions.lock().unwrap().push(interaction);
        Ok(())
    }

    fn render_config(&self) -> RenderConfig {
        RenderConfig::default()
    }

    fn attach_render_feedback(&self, session: &SessionId, _tick: &Tick) {
        self.attaches.fetch_add(1, Ordering::SeqCst);
        *self.attached.lock().unwrap() = Some(session.clone());
    }

    fn release(&self, session: &SessionId) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        let mut attached = self.attached.lock().unwrap();
        if attached.as_ref() == Some(session) {
            *attached = None;
        }
    }
}

#[derive(Default)]
pub struct ScriptedEngine {
    simulations: Mutex<HashMap<ViewId, Arc<ScriptedSimulation>>>,
    pub created: AtomicUsize,
}

impl ScriptedEngine {
    pub fn simulation(&self, view_id: &ViewId) -> Arc<ScriptedSimulation> {
        Arc::clone(
            self.simulations
                .lock()
                .unwrap()
                .entry(view_id.clone())
                .or_insert_with(|| Arc::new(ScriptedSimulation::new(view_id.clone()))),
        )
    }
}

#[async_trait]
impl SimulationEngine for ScriptedEngine {
    async fn create_or_attach(
        &self,
        view: &View,
        _dataset: Option<&Dataset>,
        _config: &LayoutConfig,
        _artifacts: &Store<ContentHash, Arc<[u8]>>,
    ) -> Result<SimulationRef, SimulationError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let simulation: SimulationRef = self.simulation(&view.id);
        Ok(simulation)
    }
}

pub struct RecordingTransport {
    outbound: mpsc::UnboundedSender<ServerMessage>,
    closed: Mutex<Option<CloseReason>>,
    hold: Mutex<Option<fn(&ServerMessage) -> bool>>,
    released: watch::Sender<bool>,
    pub failing: AtomicBool,
    /// Sends currently parked by [`RecordingTransport::hold`].
    pub parked: AtomicUsize,
}

impl RecordingTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerMessage>) {
        let (outbound, received) = mpsc::unbounded_channel();
        let (released, _) = watch::channel(true);
        let transport = Arc::new(Self {
            outbound,
            closed: Mutex::new(None),
            hold: Mutex::new(None),
            released,
            failing: AtomicBool::new(false),
            parked: AtomicUsize::new(0),
        });
        (transport, received)
    }

    pub fn closed(&self) -> Option<CloseReason> {
        *self.closed.lock().unwrap()
    }

    /// Park every send of a message matching `filter`, like a socket
    /// whose peer stopped reading, until [`RecordingTransport::release`].
    pub fn hold(&self, filter: fn(&ServerMessage) -> bool) {
        *self.hold.lock().unwrap() = Some(filter);
        self.released.send_replace(false);
    }

    /// Let parked and future sends through.
    pub fn release(&self) {
        *self.hold.lock().unwrap() = None;
        self.released.send_replace(true);
    }

    pub fn parked(&self) -> usize {
        self.parked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, message: &ServerMessage) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Io(String::from("connection reset")));
        }
        let filter = *self.hold.lock().unwrap();
        if filter.is_some_and(|held| held(message)) {
            self.parked.fetch_add(1, Ordering::SeqCst);
            let mut released = self.released.subscribe();
            let _ = released.wait_for(|released| *released).await;
            self.parked.fetch_sub(1, Ordering::SeqCst);
        }
        let _ = self.outbound.send(message.clone());
        Ok(())
    }

    async fn close(&self, reason: CloseReason) {
        self.closed.lock().unwrap().get_or_insert(reason);
    }
}

pub struct Fixture {
    pub ctx: Arc<SessionContext>,
    pub engine: Arc<ScriptedEngine>,
}

pub async fn fixture() -> Fixture {
    fixture_with_mask(Arc::new(SceneMask)).await
}

pub async fn fixture_with_mask(mask: Arc<dyn MaskProvider>) -> Fixture {
    let store = MemoryStore::new();
    store
        .insert_workbook(Workbook::with_dataset(
            WorkbookId::from("wb1"),
            Dataset::new("ds1".into()),
        ))
        .await;
    let engine = Arc::new(ScriptedEngine::default());
    let loader = DocumentLoader::new(
        Arc::new(CacheRegistry::new(&CacheConfig::default())),
        Arc::new(store),
        Arc::clone(&engine) as Arc<dyn SimulationEngine>,
        LayoutConfig::default(),
    );
    let ctx = SessionContext::new(loader, BindingRegistry::new(), mask, SessionConfig::default());
    Fixture {
        ctx: Arc::new(ctx),
        engine,
    }
}

pub fn options(workbook: Option<&str>) -> ConnectOptions {
    ConnectOptions {
        workbook: workbook.map(WorkbookId::from),
        ..ConnectOptions::default()
    }
}

pub struct Running {
    pub session_id: SessionId,
    pub transport: Arc<RecordingTransport>,
    pub messages: mpsc::UnboundedReceiver<ServerMessage>,
    pub state: watch::Receiver<SessionState>,
    pub inbound: mpsc::Sender<ClientMessage>,
    pub handle: JoinHandle<SessionOutcome>,
}

impl Running {
    pub async fn next_message(&mut self) -> ServerMessage {
        tokio::time::timeout(WAIT, self.messages.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("transport dropped")
    }

    /// Next delta, skipping anything else.
    pub async fn next_delta(&mut self) -> vizsession_types::Delta {
        loop {
            if let ServerMessage::Delta(delta) = self.next_message().await {
                return delta;
            }
        }
    }

    pub async fn reach(&mut self, target: SessionState) {
        tokio::time::timeout(WAIT, self.state.wait_for(|state| *state == target))
            .await
            .expect("timed out waiting for a state")
            .expect("session dropped its state");
    }

    pub async fn outcome(self) -> SessionOutcome {
        tokio::time::timeout(WAIT, self.handle)
            .await
            .expect("timed out waiting for the session to end")
            .expect("session task panicked")
    }
}

pub fn spawn_session(ctx: &Arc<SessionContext>, options: ConnectOptions, id: &str) -> Running {
    let session_id = SessionId::from(id);
    let (transport, messages) = RecordingTransport::new();
    let session = Session::new(
        session_id.clone(),
        options,
        Arc::clone(&transport) as Arc<dyn Transport>,
    );
    let state = session.state();
    let (inbound, inbound_rx) = mpsc::channel(16);
    let handle = tokio::spawn(session.run(Arc::clone(ctx), inbound_rx));
    Running {
        session_id,
        transport,
        messages,
        state,
        inbound,
        handle,
    }
}
