//! Shared harness: an orchestrator on 127.0.0.1:0 with in-memory store and
//! stream, a hash embedder, a scripted LLM, and an unroutable sandbox (so
//! validation paths are observable without a real sandbox).

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use archive::health::HealthChecker;
use archive::llm::{Engines, MockLlm};
use archive::memory::{Embedder, HashEmbedder, InMemoryMemoryStore, MemoryEntry, MemoryStore};
use archive::metrics::MetricsCollector;
use archive::persona::PersonaStore;
use archive::sandbox::SandboxClient;
use archive::settings::Settings;
use archive::stream::{InMemoryInputStream, InputStream};
use archive::worker::WorkerStats;
use serve::AppState;

pub struct TestServer {
    pub base: String,
    pub http: reqwest::Client,
    pub llm: Arc<MockLlm>,
    pub store: Arc<InMemoryMemoryStore>,
    pub stream: Arc<InMemoryInputStream>,
    pub embedder: Arc<HashEmbedder>,
    pub state: Arc<AppState>,
    cancel: CancellationToken,
    // Kept alive for the duration of the test; the tempdir backs DATA_DIR.
    pub data_dir: tempfile::TempDir,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Boots the app on a random port. No background workers run; tests drive
/// everything through the HTTP surface (or the store directly).
pub async fn spawn() -> TestServer {
    let data_dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::from_env().unwrap();
    settings.data_dir = data_dir.path().to_path_buf();

    let llm = Arc::new(MockLlm::new());
    let engines = Engines::new(
        Arc::clone(&llm) as Arc<dyn archive::llm::LlmClient>,
        None,
    );

    let embedder = Arc::new(HashEmbedder::new(settings.embed_dim));
    let store = Arc::new(InMemoryMemoryStore::new(
        Arc::clone(&embedder) as Arc<dyn Embedder>
    ));
    let stream = Arc::new(InMemoryInputStream::new());

    let http = reqwest::Client::new();
    // Unroutable collaborators: probes fail fast, sandbox calls error, and
    // the validator paths stay observable.
    let sandbox = Arc::new(SandboxClient::new(http.clone(), "http://127.0.0.1:1"));
    let health = Arc::new(HealthChecker::new(
        http.clone(),
        "http://127.0.0.1:1".to_string(),
        None,
        Some("http://127.0.0.1:1".to_string()),
        Arc::clone(&store) as Arc<dyn MemoryStore>,
    ));
    let metrics = Arc::new(MetricsCollector::new(
        Arc::clone(&health),
        Arc::clone(&store) as Arc<dyn MemoryStore>,
        None,
        std::time::Duration::from_secs(30),
    ));
    let personas = PersonaStore::new(data_dir.path());

    let state = Arc::new(AppState {
        settings,
        engines,
        store: Arc::clone(&store) as Arc<dyn MemoryStore>,
        stream: Arc::clone(&stream) as Arc<dyn InputStream>,
        embedder: Arc::clone(&embedder) as Arc<dyn Embedder>,
        sandbox: Some(sandbox),
        library: None,
        personas,
        worker_stats: Arc::new(WorkerStats::default()),
        metrics,
        health,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let cancel = CancellationToken::new();
    tokio::spawn(serve::run_on_listener(
        listener,
        Arc::clone(&state),
        cancel.clone(),
    ));

    TestServer {
        base,
        http: reqwest::Client::new(),
        llm,
        store,
        stream,
        embedder,
        state,
        cancel,
        data_dir,
    }
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    pub async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> (reqwest::StatusCode, serde_json::Value) {
        let resp = self
            .http
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.unwrap();
        eprintln!("[e2e] POST {path} -> {status}: {body}");
        (status, body)
    }

    pub async fn get_json(&self, path: &str) -> (reqwest::StatusCode, serde_json::Value) {
        let resp = self.http.get(self.url(path)).send().await.unwrap();
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.unwrap();
        eprintln!("[e2e] GET {path} -> {status}: {body}");
        (status, body)
    }

    /// Seeds one memory with a real embedding at the given timestamp.
    pub async fn seed_memory(&self, message: &str, timestamp: f64) -> String {
        let mut e = MemoryEntry::new(message);
        e.embedding = self.embedder.embed_one(message).await.unwrap();
        e.timestamp = timestamp;
        self.store.store(e).await.unwrap()
    }
}
