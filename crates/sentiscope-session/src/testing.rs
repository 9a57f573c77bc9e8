//! Hand-written fakes shared by the orchestrator and session tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};

use async_trait::async_trait;
use sentiscope_ai::LocalBackend;
use sentiscope_core::{
    BackendMode, Credential, CredentialStore, LocalPipeline, PipelineLoader, RawOutput,
    RemoteError, RemoteModel, TelemetryEvent, TelemetrySink,
};
use tokio::sync::{Notify, Semaphore};

use crate::Orchestrator;

pub const TEST_KEY: &str = "api_key";

// ── Local side ──

pub struct FixedPipeline(RawOutput);

impl LocalPipeline for FixedPipeline {
    fn classify(&self, _text: &str) -> anyhow::Result<RawOutput> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// A pipeline that always answers `POSITIVE` with the given score.
pub fn fixed(score: f32) -> Arc<dyn LocalPipeline> {
    Arc::new(FixedPipeline(RawOutput::new("POSITIVE", score)))
}

/// Pipeline that signals when inference starts and blocks until released.
pub struct GatedPipeline {
    output: RawOutput,
    entered: Arc<Notify>,
    release: Mutex<mpsc::Receiver<()>>,
}

pub struct Gate {
    entered: Arc<Notify>,
    release: mpsc::Sender<()>,
}

impl Gate {
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

impl GatedPipeline {
    pub fn new(output: RawOutput) -> (Arc<dyn LocalPipeline>, Gate) {
        let entered = Arc::new(Notify::new());
        let (tx, rx) = mpsc::channel();
        let pipeline = Arc::new(Self {
            output,
            entered: Arc::clone(&entered),
            release: Mutex::new(rx),
        });
        (pipeline, Gate { entered, release: tx })
    }
}

impl LocalPipeline for GatedPipeline {
    fn classify(&self, _text: &str) -> anyhow::Result<RawOutput> {
        self.entered.notify_one();
        // A dropped gate also releases.
        let _ = self.release.lock().unwrap().recv();
        Ok(self.output.clone())
    }

    fn name(&self) -> &str {
        "gated"
    }
}

/// Loader that waits for a permit per load and fails the first `failures` loads.
pub struct TestLoader {
    pipeline: Arc<dyn LocalPipeline>,
    gate: Semaphore,
    loads: AtomicUsize,
    failures: usize,
}

impl TestLoader {
    pub fn gated(pipeline: Arc<dyn LocalPipeline>, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            pipeline,
            gate: Semaphore::new(0),
            loads: AtomicUsize::new(0),
            failures,
        })
    }

    pub fn instant(pipeline: Arc<dyn LocalPipeline>) -> Arc<Self> {
        let loader = Self::gated(pipeline, 0);
        loader.gate.add_permits(64);
        loader
    }

    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PipelineLoader for TestLoader {
    async fn load(&self) -> anyhow::Result<Arc<dyn LocalPipeline>> {
        let n = self.loads.fetch_add(1, Ordering::SeqCst);
        self.gate.acquire().await?.forget();
        if n < self.failures {
            anyhow::bail!("model payload fetch failed");
        }
        Ok(Arc::clone(&self.pipeline))
    }
}

pub fn backend(loader: &Arc<TestLoader>) -> Arc<LocalBackend> {
    Arc::new(LocalBackend::new(loader.clone()))
}

/// A local backend whose pipeline is already loaded.
pub async fn ready_backend(pipeline: Arc<dyn LocalPipeline>) -> Arc<LocalBackend> {
    let backend = backend(&TestLoader::instant(pipeline));
    backend.init().await.unwrap();
    backend
}

// ── Remote side ──

pub struct FakeRemote {
    reply: Result<RawOutput, RemoteError>,
    calls: AtomicUsize,
    last_credential: Mutex<Option<String>>,
}

impl FakeRemote {
    pub fn ok(output: RawOutput) -> Arc<Self> {
        Self::with_reply(Ok(output))
    }

    pub fn err(err: RemoteError) -> Arc<Self> {
        Self::with_reply(Err(err))
    }

    fn with_reply(reply: Result<RawOutput, RemoteError>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            last_credential: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_credential(&self) -> Option<String> {
        self.last_credential.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteModel for FakeRemote {
    async fn classify(
        &self,
        _item: &str,
        credential: &Credential,
    ) -> Result<RawOutput, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_credential.lock().unwrap() = Some(credential.expose().to_string());
        self.reply.clone()
    }
}

pub struct Keys(HashMap<String, String>);

impl Keys {
    pub fn none() -> Arc<Self> {
        Arc::new(Self(HashMap::new()))
    }

    pub fn with_key() -> Arc<Self> {
        Arc::new(Self(HashMap::from([(
            TEST_KEY.to_string(),
            "sk-test".to_string(),
        )])))
    }
}

impl CredentialStore for Keys {
    fn credential(&self, key: &str) -> Option<Credential> {
        self.0.get(key).and_then(|v| Credential::new(v.as_str()))
    }
}

pub fn orchestrator(
    local: Arc<LocalBackend>,
    remote: Arc<FakeRemote>,
    keys: Arc<Keys>,
    mode: BackendMode,
) -> Orchestrator {
    Orchestrator::new(local, remote, keys, TEST_KEY, mode)
}

// ── Telemetry ──

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl TelemetrySink for RecordingSink {
    fn record(&self, event: TelemetryEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Sink whose deliveries never complete, like a collector that accepts the
/// connection and never answers.
#[derive(Default)]
pub struct StalledSink {
    attempts: Arc<AtomicUsize>,
}

impl StalledSink {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl TelemetrySink for StalledSink {
    fn record(&self, _event: TelemetryEvent) {
        let attempts = Arc::clone(&self.attempts);
        tokio::spawn(async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<()>().await;
        });
    }
}
