//! Integration tests for the document loader.
//!
//! Uses an in-memory store wrapped with fetch counters and a failure
//! switch, and a stub engine whose simulations never tick.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use vizsession_cache::{CacheConfig, CacheRegistry, ContentHash, Store};
use vizsession_loader::{
    BackingStore, DocumentKind, DocumentLoader, LayoutConfig, LoaderError, MemoryStore,
    Simulation, SimulationEngine, SimulationError, SimulationRef, StoreError,
};
use vizsession_types::{
    ConnectOptions, Dataset, Interaction, RenderConfig, Scene, SessionId, Tick, View, ViewId,
    Workbook, WorkbookId,
};

struct CountingStore {
    inner: MemoryStore,
    fetches: AtomicUsize,
    failing: AtomicBool,
}

#[async_trait]
impl BackingStore for CountingStore {
    async fn fetch_workbook(&self, id: &WorkbookId) -> Result<Workbook, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(String::from("connection refused")));
        }
        self.inner.fetch_workbook(id).await
    }

    async fn fetch_view(&self, id: &ViewId) -> Result<View, StoreError> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.inner.fetch_view(id).await
    }
}

struct IdleSimulation {
    view_id: ViewId,
    ticks: broadcast::Sender<Arc<Tick>>,
}

impl Simulation for IdleSimulation {
    fn view_id(&self) -> &ViewId {
        &self.view_id
    }

    fn ticks(&self) -> broadcast::Receiver<Arc<Tick>> {
        self.ticks.subscribe()
    }

    fn interact(&self, _interaction: Interaction) -> Result<(), SimulationError> {
        Ok(())
    }

    fn render_config(&self) -> RenderConfig {
        RenderConfig::default()
    }

    fn attach_render_feedback(&self, _session: &SessionId, _tick: &Tick) {}

    fn release(&self, _session: &SessionId) {}
}

#[derive(Default)]
struct CountingEngine {
    created: AtomicUsize,
}

#[async_trait]
impl SimulationEngine for CountingEngine {
    async fn create_or_attach(
        &self,
        view: &View,
        _dataset: Option<&Dataset>,
        _config: &LayoutConfig,
        _artifacts: &Store<ContentHash, Arc<[u8]>>,
    ) -> Result<SimulationRef, SimulationError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        let (ticks, _) = broadcast::channel(4);
        Ok(Arc::new(IdleSimulation {
            view_id: view.id.clone(),
            ticks,
        }))
    }
}

struct Fixture {
    loader: DocumentLoader,
    store: Arc<CountingStore>,
    engine: Arc<CountingEngine>,
}

async fn fixture() -> Fixture {
    let inner = MemoryStore::new();
    inner
        .insert_workbook(Workbook::with_dataset(WorkbookId::from("wb1"), Dataset::new("ds".into())))
        .await;
    inner
        .insert_workbook(Workbook::with_dataset(WorkbookId::from("wb2"), Dataset::new("ds2".into())))
        .await;
    inner
        .insert_view(View {
            id: ViewId::from("side"),
            workbook_id: WorkbookId::from("wb1"),
            title: String::from("Side view"),
            dataset_id: None,
            scene: Scene::default(),
            expression_templates: vec![String::from("point:degree > 2")],
        })
        .await;

    inner
        .insert_view(View {
            id: ViewId::from("top"),
            workbook_id: WorkbookId::from("wb1"),
            title: String::from("Top view"),
            dataset_id: None,
            scene: Scene::default(),
            expression_templates: Vec::new(),
        })
        .await;

    let store = Arc::new(CountingStore {
        inner,
        fetches: AtomicUsize::new(0),
        failing: AtomicBool::new(false),
    });
    let engine = Arc::new(CountingEngine::default());
    let caches = Arc::new(CacheRegistry::new(&CacheConfig::default()));
    let loader = DocumentLoader::new(
        caches,
        Arc::clone(&store) as Arc<dyn BackingStore>,
        Arc::clone(&engine) as Arc<dyn SimulationEngine>,
        LayoutConfig::default(),
    );
    Fixture {
        loader,
        store,
        engine,
    }
}

#[tokio::test]
async fn unknown_workbook_is_not_found() {
    let f = fixture().await;
    let err = f
        .loader
        .load_workbooks(&[WorkbookId::from("missing")], &ConnectOptions::default())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LoaderError::NotFound {
            kind: DocumentKind::Workbook,
            id: String::from("missing"),
        }
    );
}

#[tokio::test]
async fn store_failure_is_surfaced_and_retried_next_time() {
    let f = fixture().await;
    f.store.failing.store(true, Ordering::SeqCst);
    let ids = [WorkbookId::from("wb1")];

    let err = f
        .loader
        .load_workbooks(&ids, &ConnectOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LoaderError::Store(_)));

    f.store.failing.store(false, Ordering::SeqCst);
    let workbooks = f
        .loader
        .load_workbooks(&ids, &ConnectOptions::default())
        .await
        .unwrap();
    assert_eq!(workbooks.len(), 1);
    assert_eq!(f.store.fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn workbooks_are_fetched_once() {
    let f = fixture().await;
    let ids = [WorkbookId::from("wb1")];
    for _ in 0..3 {
        f.loader
            .load_workbooks(&ids, &ConnectOptions::default())
            .await
            .unwrap();
    }
    assert_eq!(f.store.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn current_view_is_resolved_when_no_view_requested() {
    let f = fixture().await;
    let loaded = f
        .loader
        .load_views(&[WorkbookId::from("wb1")], None, &ConnectOptions::default())
        .await
        .unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.first().unwrap().view.id.as_str(), "wb1:view:0");
}

#[tokio::test]
async fn standalone_view_is_merged_into_cached_workbook() {
    let f = fixture().await;
    let wb = [WorkbookId::from("wb1")];
    let side = [ViewId::from("side")];

    let loaded = f
        .loader
        .load_views(&wb, Some(side.as_slice()), &ConnectOptions::default())
        .await
        .unwrap();
    let first = loaded.first().unwrap();
    assert_eq!(first.view.expression_templates.len(), 1);
    assert!(first.workbook.view(&ViewId::from("side")).is_some());

    let cached = f
        .loader
        .caches()
        .workbooks_by_id
        .get(&WorkbookId::from("wb1"))
        .await
        .unwrap();
    assert!(cached.view(&ViewId::from("side")).is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_view_merges_keep_both_views() {
    let f = fixture().await;
    let wb = [WorkbookId::from("wb1")];
    // Both loads start from the same cached snapshot.
    f.loader
        .load_workbooks(&wb, &ConnectOptions::default())
        .await
        .unwrap();

    let handles: Vec<_> = ["side", "top"]
        .into_iter()
        .map(|id| {
            let loader = f.loader.clone();
            tokio::spawn(async move {
                loader
                    .load_views(
                        &[WorkbookId::from("wb1")],
                        Some([ViewId::from(id)].as_slice()),
                        &ConnectOptions::default(),
                    )
                    .await
            })
        })
        .collect();
    for joined in futures::future::join_all(handles).await {
        joined.unwrap().unwrap();
    }

    let cached = f
        .loader
        .caches()
        .workbooks_by_id
        .get(&WorkbookId::from("wb1"))
        .await
        .unwrap();
    assert!(cached.view(&ViewId::from("side")).is_some());
    assert!(cached.view(&ViewId::from("top")).is_some());
    assert!(cached.view(&ViewId::from("wb1:view:0")).is_some());
}

#[tokio::test]
async fn view_of_another_workbook_is_not_found() {
    let f = fixture().await;
    let err = f
        .loader
        .load_views(
            &[WorkbookId::from("wb2")],
            Some([ViewId::from("side")].as_slice()),
            &ConnectOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LoaderError::NotFound {
            kind: DocumentKind::View,
            ..
        }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_simulation_loads_create_one_simulation() {
    let f = fixture().await;
    let loaded = f
        .loader
        .load_views(&[WorkbookId::from("wb1")], None, &ConnectOptions::default())
        .await
        .unwrap();
    let view = loaded.first().unwrap().clone();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let loader = f.loader.clone();
        let view = view.clone();
        handles.push(tokio::spawn(async move { loader.load_simulation(&view).await }));
    }
    let sims: Vec<SimulationRef> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(f.engine.created.load(Ordering::SeqCst), 1);
    let first = sims.first().unwrap();
    assert!(sims.iter().all(|s| Arc::ptr_eq(s, first)));
    assert_eq!(first.view_id().as_str(), "wb1:view:0");
}
