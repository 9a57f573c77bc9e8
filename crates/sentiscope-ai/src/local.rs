//! Lazily-initialised local backend.
//!
//! The pipeline is constructed on first use by a [`PipelineLoader`]. Every
//! caller that asks for initialisation while a load is in progress joins the
//! same [`futures::future::Shared`] future, so a slow model load is never
//! started twice. A failed load leaves the backend in [`LocalState::Failed`];
//! the next request starts a fresh load.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use sentiscope_core::{InferenceError, InitError, LocalPipeline, PipelineLoader, RawOutput};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Shared handle on an in-progress (or finished) initialisation.
pub type InitFuture = Shared<BoxFuture<'static, Result<(), InitError>>>;

/// Lifecycle of the local model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalState {
    /// Never requested.
    Idle,
    /// Load in progress.
    Initializing,
    /// Pipeline loaded; classification possible.
    Ready,
    /// Last load failed. Recoverable by initialising again.
    Failed,
}

impl LocalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

enum Slot {
    Idle,
    Loading(InitFuture),
    Ready(Arc<dyn LocalPipeline>),
    Failed(InitError),
}

struct Inner {
    loader: Arc<dyn PipelineLoader>,
    slot: Mutex<Slot>,
    state: watch::Sender<LocalState>,
}

impl Inner {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the loader and settle the slot. Only ever polled through the
    /// shared future, so it settles exactly once per load.
    async fn load(self: Arc<Self>) -> Result<(), InitError> {
        let start = Instant::now();
        let outcome = self.loader.load().await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let mut slot = self.lock_slot();
        match outcome {
            Ok(pipeline) => {
                info!(pipeline = pipeline.name(), elapsed_ms, "local model ready");
                *slot = Slot::Ready(pipeline);
                self.state.send_replace(LocalState::Ready);
                Ok(())
            }
            Err(e) => {
                let err = InitError(format!("{e:#}"));
                warn!(error = %err, elapsed_ms, "local model load failed");
                *slot = Slot::Failed(err.clone());
                self.state.send_replace(LocalState::Failed);
                Err(err)
            }
        }
    }
}

/// In-process backend wrapping a lazily-constructed [`LocalPipeline`].
pub struct LocalBackend {
    inner: Arc<Inner>,
}

impl LocalBackend {
    pub fn new(loader: Arc<dyn PipelineLoader>) -> Self {
        let (state, _) = watch::channel(LocalState::Idle);
        Self {
            inner: Arc::new(Inner {
                loader,
                slot: Mutex::new(Slot::Idle),
                state,
            }),
        }
    }

    pub fn state(&self) -> LocalState {
        *self.inner.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LocalState::Ready
    }

    /// Error from the most recent failed load, if the backend is `Failed`.
    pub fn last_error(&self) -> Option<InitError> {
        match &*self.inner.lock_slot() {
            Slot::Failed(err) => Some(err.clone()),
            _ => None,
        }
    }

    /// Start initialisation if needed and return the shared load future.
    ///
    /// The state flips to `Initializing` before this returns, even though the
    /// load itself only runs once the returned future is polled.
    pub fn begin_init(&self) -> InitFuture {
        let mut slot = self.inner.lock_slot();
        match &*slot {
            Slot::Ready(_) => return futures::future::ready(Ok(())).boxed().shared(),
            Slot::Loading(pending) => {
                debug!("joining in-flight local model load");
                return pending.clone();
            }
            Slot::Idle | Slot::Failed(_) => {}
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let load = async move {
            match weak.upgrade() {
                Some(inner) => inner.load().await,
                None => Err(InitError("local backend dropped during load".into())),
            }
        }
        .boxed()
        .shared();
        *slot = Slot::Loading(load.clone());
        self.inner.state.send_replace(LocalState::Initializing);
        info!("local model initialization started");
        load
    }

    /// Initialise the pipeline. Idempotent: a no-op once ready, and joins any
    /// load already in progress.
    pub async fn init(&self) -> Result<(), InitError> {
        self.begin_init().await
    }

    /// Wait for an in-progress load to finish and return the resulting state.
    ///
    /// Returns immediately when no load is in progress.
    pub async fn wait_settled(&self) -> LocalState {
        let pending = match &*self.inner.lock_slot() {
            Slot::Loading(load) => Some(load.clone()),
            _ => None,
        };
        if let Some(load) = pending {
            let _ = load.await;
        }
        self.state()
    }

    /// Classify one item with the loaded pipeline.
    ///
    /// Fails with [`InferenceError::NotInitialized`] before `init` completes.
    pub async fn classify(&self, item: &str) -> Result<RawOutput, InferenceError> {
        let pipeline = match &*self.inner.lock_slot() {
            Slot::Ready(pipeline) => Arc::clone(pipeline),
            _ => return Err(InferenceError::NotInitialized),
        };

        let text = item.to_string();
        tokio::task::spawn_blocking(move || pipeline.classify(&text))
            .await
            .map_err(|e| InferenceError::Failed(format!("inference task failed: {e}")))?
            .map_err(|e| InferenceError::Failed(format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    struct FixedPipeline;

    impl LocalPipeline for FixedPipeline {
        fn classify(&self, _text: &str) -> anyhow::Result<RawOutput> {
            Ok(RawOutput::new("POSITIVE", 0.98))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    /// Loader that blocks until the test releases a permit, and fails the
    /// first `failures` loads.
    struct GatedLoader {
        gate: Semaphore,
        loads: AtomicUsize,
        failures: usize,
    }

    impl GatedLoader {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(0),
                loads: AtomicUsize::new(0),
                failures,
            })
        }

        fn release(&self) {
            self.gate.add_permits(1);
        }

        fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PipelineLoader for GatedLoader {
        async fn load(&self) -> anyhow::Result<Arc<dyn LocalPipeline>> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            self.gate.acquire().await?.forget();
            if n < self.failures {
                anyhow::bail!("model download interrupted");
            }
            Ok(Arc::new(FixedPipeline))
        }
    }

    #[tokio::test]
    async fn classify_before_init_fails() {
        let backend = LocalBackend::new(GatedLoader::new(0));
        let err = backend.classify("hello").await.unwrap_err();
        assert!(matches!(err, InferenceError::NotInitialized));
        assert_eq!(backend.state(), LocalState::Idle);
    }

    #[tokio::test]
    async fn begin_init_marks_initializing_immediately() {
        let loader = GatedLoader::new(0);
        let backend = LocalBackend::new(loader.clone());
        let _pending = backend.begin_init();
        assert_eq!(backend.state(), LocalState::Initializing);
        assert!(matches!(
            backend.classify("hello").await,
            Err(InferenceError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn concurrent_inits_share_one_load() {
        let loader = GatedLoader::new(0);
        let backend = Arc::new(LocalBackend::new(loader.clone()));

        let a = tokio::spawn({
            let backend = Arc::clone(&backend);
            async move { backend.init().await }
        });
        let b = tokio::spawn({
            let backend = Arc::clone(&backend);
            async move { backend.init().await }
        });

        tokio::task::yield_now().await;
        loader.release();

        assert!(a.await.unwrap().is_ok());
        assert!(b.await.unwrap().is_ok());
        assert_eq!(loader.loads(), 1);
        assert!(backend.is_ready());
    }

    #[tokio::test]
    async fn init_when_ready_is_noop() {
        let loader = GatedLoader::new(0);
        let backend = LocalBackend::new(loader.clone());
        loader.release();
        backend.init().await.unwrap();
        backend.init().await.unwrap();
        assert_eq!(loader.loads(), 1);
    }

    #[tokio::test]
    async fn classify_after_init_uses_pipeline() {
        let loader = GatedLoader::new(0);
        let backend = LocalBackend::new(loader.clone());
        loader.release();
        backend.init().await.unwrap();

        let raw = backend.classify("Great product!").await.unwrap();
        assert_eq!(raw, RawOutput::new("POSITIVE", 0.98));
    }

    #[tokio::test]
    async fn failed_load_is_recoverable() {
        let loader = GatedLoader::new(1);
        let backend = LocalBackend::new(loader.clone());

        loader.release();
        let err = backend.init().await.unwrap_err();
        assert!(err.to_string().contains("download interrupted"));
        assert_eq!(backend.state(), LocalState::Failed);
        assert!(backend.last_error().is_some());

        loader.release();
        backend.init().await.unwrap();
        assert_eq!(backend.state(), LocalState::Ready);
        assert_eq!(loader.loads(), 2);
        assert!(backend.last_error().is_none());
    }

    #[tokio::test]
    async fn wait_settled_drives_pending_load() {
        let loader = GatedLoader::new(0);
        let backend = LocalBackend::new(loader.clone());
        let _pending = backend.begin_init();
        loader.release();
        assert_eq!(backend.wait_settled().await, LocalState::Ready);
    }

    #[tokio::test]
    async fn wait_settled_without_load_returns_immediately() {
        let backend = LocalBackend::new(GatedLoader::new(0));
        assert_eq!(backend.wait_settled().await, LocalState::Idle);
    }
}
