//! Startup wiring: build the shared handles from settings, spawn the
//! background workers, serve HTTP with graceful shutdown.

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use archive::archival::ArchivalWorker;
use archive::health::HealthChecker;
use archive::library::LibraryClient;
use archive::llm::{Engines, HttpLlm};
use archive::memory::{
    Embedder, HashEmbedder, HttpEmbedder, InMemoryMemoryStore, MemoryStore, RedisMemoryStore,
};
use archive::metrics::MetricsCollector;
use archive::persona::PersonaStore;
use archive::sandbox::SandboxClient;
use archive::settings::Settings;
use archive::stream::{InMemoryInputStream, InputStream, RedisInputStream};
use archive::worker::{MemoryWorker, WorkerStats};

use crate::app::{router, AppState};

#[derive(Debug, Error)]
pub enum BootError {
    #[error("settings: {0}")]
    Settings(#[from] archive::settings::SettingsError),
    #[error("kv store: {0}")]
    Kv(#[from] redis::RedisError),
    #[error("memory index: {0}")]
    Store(#[from] archive::memory::StoreError),
    #[error("bind: {0}")]
    Io(#[from] std::io::Error),
}

/// The state plus the worker inputs that are not part of it.
pub struct Boot {
    pub state: Arc<AppState>,
    worker: MemoryWorker,
    archival: Option<ArchivalWorker>,
}

/// Builds every long-lived handle from settings. One LLM pool, one KV
/// connection, one of each store; all shared from here on.
pub async fn boot(settings: Settings) -> Result<Boot, BootError> {
    let http = reqwest::Client::new();

    let fast = Arc::new(
        HttpLlm::new(http.clone(), &settings.fast_engine_url, &settings.fast_model)
            .with_timeout(settings.llm_timeout)
            .with_max_tokens(settings.max_tokens),
    );
    let deep = settings.deep_engine_url.as_ref().map(|url| {
        Arc::new(
            HttpLlm::new(http.clone(), url, &settings.deep_model)
                .with_timeout(settings.llm_timeout)
                .with_max_tokens(settings.max_tokens),
        ) as Arc<dyn archive::llm::LlmClient>
    });
    if deep.is_none() {
        info!("no deep engine configured; routing all chat to the fast engine");
    }
    let engines = Engines::new(fast.clone(), deep);

    let embedder: Arc<dyn Embedder> = match &settings.embedder_url {
        Some(url) => Arc::new(HttpEmbedder::new(
            http.clone(),
            url,
            &settings.embed_model,
            settings.embed_dim,
        )),
        None => Arc::new(HashEmbedder::new(settings.embed_dim)),
    };

    // Backends: Redis when KV_URL is set, in-memory otherwise.
    let (store, stream, kv_mirror): (
        Arc<dyn MemoryStore>,
        Arc<dyn InputStream>,
        Option<redis::aio::ConnectionManager>,
    ) = match &settings.kv_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            let conn = redis::aio::ConnectionManager::new(client).await?;
            let store = Arc::new(RedisMemoryStore::new(conn.clone(), Arc::clone(&embedder)));
            store.ensure_index().await?;
            let stream = Arc::new(RedisInputStream::new(
                conn.clone(),
                &settings.stream_key,
                &settings.last_id_key,
            ));
            (store, stream, Some(conn))
        }
        None => {
            info!("no KV_URL configured; using in-memory store and stream");
            (
                Arc::new(InMemoryMemoryStore::new(Arc::clone(&embedder))),
                Arc::new(InMemoryInputStream::new()),
                None,
            )
        }
    };

    let sandbox = settings.sandbox_url.as_ref().map(|url| {
        Arc::new(SandboxClient::new(http.clone(), url).with_timeout(settings.sandbox_timeout))
    });
    let library = settings
        .library_url
        .as_ref()
        .map(|url| Arc::new(LibraryClient::new(http.clone(), url)));

    let health = Arc::new(HealthChecker::new(
        http.clone(),
        settings.fast_engine_url.clone(),
        settings.deep_engine_url.clone(),
        settings.sandbox_url.clone(),
        Arc::clone(&store),
    ));
    let metrics = Arc::new(MetricsCollector::new(
        Arc::clone(&health),
        Arc::clone(&store),
        kv_mirror,
        std::time::Duration::from_secs(settings.metrics_sample_sec.max(1)),
    ));

    std::fs::create_dir_all(&settings.data_dir)?;
    let personas = PersonaStore::new(&settings.data_dir);

    let worker_stats = Arc::new(WorkerStats::default());
    let worker = MemoryWorker::new(
        Arc::clone(&stream),
        Arc::clone(&store),
        Arc::clone(&embedder),
        fast,
        settings.surprise(),
        settings.stream_maxlen,
        settings.start_from_latest,
        Arc::clone(&worker_stats),
    );

    let archival = settings.archive_enabled.then(|| {
        ArchivalWorker::new(
            Arc::clone(&store),
            &settings.data_dir,
            settings.archive_policy(),
        )
    });

    let state = Arc::new(AppState {
        settings,
        engines,
        store,
        stream,
        embedder,
        sandbox,
        library,
        personas,
        worker_stats,
        metrics,
        health,
    });

    Ok(Boot {
        state,
        worker,
        archival,
    })
}

/// Spawns the memory worker, the archival scheduler, and the metrics
/// sampler. They all stop within one poll interval of `cancel`.
pub fn spawn_workers(boot: Boot, cancel: &CancellationToken) -> Arc<AppState> {
    let Boot {
        state,
        worker,
        archival,
    } = boot;

    tokio::spawn(worker.run(cancel.clone()));
    if let Some(archival) = archival {
        tokio::spawn(archival.run(cancel.clone()));
    }
    tokio::spawn(Arc::clone(&state.metrics).run(cancel.clone()));

    state
}

/// Serves the API on an existing listener until `cancel` fires. Tests bind
/// 127.0.0.1:0 and pass the listener in.
pub async fn run_on_listener(
    listener: TcpListener,
    state: Arc<AppState>,
    cancel: CancellationToken,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    info!(%addr, "archive orchestrator listening");
    let app = router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

/// Full production entry: boot, spawn workers, serve, shut down on ctrl-c.
pub async fn run(settings: Settings) -> Result<(), BootError> {
    let bind_addr = settings.bind_addr.clone();
    let boot_result = boot(settings).await?;
    let cancel = CancellationToken::new();
    let state = spawn_workers(boot_result, &cancel);

    let listener = TcpListener::bind(&bind_addr).await?;

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    run_on_listener(listener, state, cancel).await?;
    info!("server stopped");
    Ok(())
}
