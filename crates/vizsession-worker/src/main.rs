//! Worker binary for the visualization session orchestrator.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `vizsession-config.yaml`
//! 3. Create the cache registry
//! 4. Open the workbook backing store
//! 5. Wire the document loader, layout engine, and session context
//! 6. Create the snapshot publisher
//! 7. Serve HTTP + `WebSocket` until `Ctrl-C`
//! 8. Tear down the cache registry

mod config;
mod error;

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;
use vizsession_cache::CacheRegistry;
use vizsession_core::{BindingRegistry, SceneMask, SessionContext};
use vizsession_loader::{BackingStore, DocumentLoader, DragonflyStore, MemoryStore};
use vizsession_publish::{ContentSchema, LocalDirSink, StagedPublisher};
use vizsession_server::AppState;
use vizsession_sim::LayoutEngine;

use crate::config::{AppConfig, StoreBackend, StoreConfig};
use crate::error::WorkerError;

const CONFIG_FILE: &str = "vizsession-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step or the server fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("vizsession-worker starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        host = config.server.host,
        port = config.server.port,
        backend = ?config.store.backend,
        tick_interval_ms = config.simulation.tick_interval_ms,
        "Configuration loaded"
    );

    // 3. Create the cache registry.
    let caches = Arc::new(CacheRegistry::new(&config.cache));

    // 4. Open the backing store.
    let store = open_store(&config.store).await?;

    // 5. Wire the loader and session context.
    let loader = DocumentLoader::new(
        Arc::clone(&caches),
        store,
        Arc::new(LayoutEngine::new()),
        config.simulation.clone(),
    );
    let sessions = Arc::new(SessionContext::new(
        loader,
        BindingRegistry::new(),
        Arc::new(SceneMask),
        config.session.clone(),
    ));

    // 6. Snapshot publisher.
    let publisher = StagedPublisher::new(
        Arc::new(LocalDirSink::new(config.publish.root.clone())),
        ContentSchema::new(&config.publish.prefix),
    );
    info!(root = %config.publish.root.display(), "Snapshot publisher ready");

    // 7. Serve until Ctrl-C.
    let state = Arc::new(AppState::new(sessions, publisher));
    let server = vizsession_server::spawn_server(&config.server, state)
        .await
        .map_err(WorkerError::from)?;
    let result = server.await.map_err(|e| WorkerError::Join {
        message: e.to_string(),
    })?;

    // 8. Tear down.
    caches.shutdown();
    result.map_err(WorkerError::from)?;
    info!("vizsession-worker stopped");
    Ok(())
}

/// Load configuration from `vizsession-config.yaml`, falling back to
/// defaults (plus environment overrides) when the file is absent.
fn load_config() -> Result<AppConfig, WorkerError> {
    let config_path = Path::new(CONFIG_FILE);
    if config_path.exists() {
        Ok(AppConfig::from_file(config_path)?)
    } else {
        info!("Config file not found, using defaults");
        let mut config = AppConfig::default();
        config.apply_env_overrides()?;
        Ok(config)
    }
}

async fn open_store(config: &StoreConfig) -> Result<Arc<dyn BackingStore>, WorkerError> {
    match config.backend {
        StoreBackend::Dragonfly => {
            info!(url = config.dragonfly_url, "Connecting to Dragonfly");
            let store = DragonflyStore::connect(&config.dragonfly_url).await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            let store = match &config.seed_dir {
                Some(dir) => MemoryStore::from_dir(dir).await?,
                None => MemoryStore::new(),
            };
            Ok(Arc::new(store))
        }
    }
}
