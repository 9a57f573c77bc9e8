//! Mode orchestrator: owns the active [`BackendMode`], drives local model
//! initialisation, and routes each classification to the backend that was
//! active when the request was issued.
//!
//! At most one classification runs at a time. A second request while one is
//! in flight is rejected with [`ClassifyError::Busy`] rather than queued. Mode
//! switches are never blocked by an in-flight request.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use sentiscope_ai::{InitFuture, LocalBackend, LocalState};
use sentiscope_core::{
    BackendMode, ClassificationResult, ClassifyError, CredentialStore, InitError, RemoteModel,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Outcome of [`Orchestrator::set_mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChange {
    Switched { from: BackendMode, to: BackendMode },
    /// Target was already active. Not an error.
    Unchanged(BackendMode),
}

impl fmt::Display for ModeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switched { from, to } => write!(f, "switched from {from} to {to} mode"),
            Self::Unchanged(mode) => write!(f, "already in {mode} mode"),
        }
    }
}

/// Coarse engine state as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Initializing,
    Ready,
    Busy,
    Failed,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Busy => "busy",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classification tagged with the mode that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedResult {
    pub mode: BackendMode,
    pub item: String,
    pub result: ClassificationResult,
    pub elapsed: Duration,
}

/// Clears the in-flight flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Inner {
    mode: watch::Sender<BackendMode>,
    local: Arc<LocalBackend>,
    remote: Arc<dyn RemoteModel>,
    credentials: Arc<dyn CredentialStore>,
    credential_key: String,
    in_flight: AtomicBool,
    /// Bumped for every load started; only the newest load may trigger a fallback.
    load_generation: AtomicU64,
}

impl Inner {
    /// Start a local load unless the model is loaded or loading.
    ///
    /// Callers hold the mode lock, so starting a load and the fallback check
    /// never interleave.
    fn begin_local_load(&self) -> Option<(u64, InitFuture)> {
        match self.local.state() {
            LocalState::Ready | LocalState::Initializing => None,
            LocalState::Idle | LocalState::Failed => {
                let generation = self.load_generation.fetch_add(1, Ordering::AcqRel) + 1;
                Some((generation, self.local.begin_init()))
            }
        }
    }

    /// Leave local mode after load `generation` failed.
    ///
    /// No-op when the user already left local mode, or when a newer load has
    /// started since.
    fn fall_back_from_local(&self, generation: u64, err: &InitError) {
        let switched = self.mode.send_if_modified(|mode| {
            let newest = self.load_generation.load(Ordering::Acquire) == generation;
            if *mode == BackendMode::Local && newest && self.local.state() == LocalState::Failed {
                *mode = mode.other();
                true
            } else {
                false
            }
        });
        if switched {
            warn!(error = %err, "local model unavailable, falling back to remote mode");
        } else {
            debug!(error = %err, generation, "local load failure left mode unchanged");
        }
    }
}

/// Routes classification requests to the local or remote backend.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Create an orchestrator starting in `initial` mode.
    ///
    /// Starting in local mode begins model initialisation straight away, so
    /// this must be called from within a Tokio runtime.
    pub fn new(
        local: Arc<LocalBackend>,
        remote: Arc<dyn RemoteModel>,
        credentials: Arc<dyn CredentialStore>,
        credential_key: impl Into<String>,
        initial: BackendMode,
    ) -> Self {
        let (mode, _) = watch::channel(initial);
        let orchestrator = Self {
            inner: Arc::new(Inner {
                mode,
                local,
                remote,
                credentials,
                credential_key: credential_key.into(),
                in_flight: AtomicBool::new(false),
                load_generation: AtomicU64::new(0),
            }),
        };
        if initial == BackendMode::Local {
            if let Some((generation, pending)) = orchestrator.inner.begin_local_load() {
                orchestrator.watch_load(generation, pending);
            }
        }
        orchestrator
    }

    pub fn mode(&self) -> BackendMode {
        *self.inner.mode.borrow()
    }

    /// Observe mode changes, including the fallback after a failed load.
    pub fn subscribe_mode(&self) -> watch::Receiver<BackendMode> {
        self.inner.mode.subscribe()
    }

    pub fn local(&self) -> &LocalBackend {
        &self.inner.local
    }

    pub fn state(&self) -> EngineState {
        if self.inner.in_flight.load(Ordering::Acquire) {
            return EngineState::Busy;
        }
        match self.inner.local.state() {
            LocalState::Idle => EngineState::Idle,
            LocalState::Initializing => EngineState::Initializing,
            LocalState::Ready => EngineState::Ready,
            LocalState::Failed => EngineState::Failed,
        }
    }

    /// Resolves once the local backend is no longer initialising.
    ///
    /// When the load failed in local mode, the fallback to remote mode has
    /// been applied by the time this returns.
    pub async fn wait_for_local(&self) -> LocalState {
        let state = self.inner.local.wait_settled().await;
        if state == LocalState::Failed {
            if let Some(err) = self.inner.local.last_error() {
                let generation = self.inner.load_generation.load(Ordering::Acquire);
                self.inner.fall_back_from_local(generation, &err);
            }
        }
        state
    }

    /// Switch the active mode.
    ///
    /// Entering local mode starts model initialisation in the background if
    /// the model is neither loaded nor loading; asking for local mode again
    /// after a failed load retries it. Entering remote mode does no backend
    /// work; the credential is looked up per request.
    pub fn set_mode(&self, target: BackendMode) -> ModeChange {
        let mut from = target;
        let mut load = None;
        let changed = self.inner.mode.send_if_modified(|mode| {
            from = *mode;
            *mode = target;
            if target == BackendMode::Local {
                load = self.inner.begin_local_load();
            }
            from != target
        });

        if let Some((generation, pending)) = load {
            self.watch_load(generation, pending);
        }

        if !changed {
            debug!(mode = %target, "mode unchanged");
            return ModeChange::Unchanged(target);
        }

        info!(from = %from, to = %target, "mode switched");
        ModeChange::Switched { from, to: target }
    }

    /// Apply the fallback in the background if load `generation` fails.
    fn watch_load(&self, generation: u64, pending: InitFuture) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            if let Err(err) = pending.await {
                if let Some(inner) = weak.upgrade() {
                    inner.fall_back_from_local(generation, &err);
                }
            }
        });
    }

    /// Classify one item with the backend active right now.
    ///
    /// The result carries the mode captured here, even if the user switches
    /// mode before it resolves.
    pub async fn classify(&self, item: &str) -> Result<TaggedResult, ClassifyError> {
        let item = item.trim();
        if item.is_empty() {
            return Err(ClassifyError::EmptyItem);
        }

        let Some(_guard) = InFlight::acquire(&self.inner.in_flight) else {
            debug!("classification rejected, another is in flight");
            return Err(ClassifyError::Busy);
        };

        let mode = self.mode();
        let start = Instant::now();
        let raw = match mode {
            BackendMode::Local => {
                if !self.inner.local.is_ready() {
                    return Err(ClassifyError::NotReady);
                }
                self.inner.local.classify(item).await?
            }
            BackendMode::Remote => {
                let credential = self
                    .inner
                    .credentials
                    .credential(&self.inner.credential_key)
                    .ok_or_else(|| ClassifyError::MissingCredential {
                        key: self.inner.credential_key.clone(),
                    })?;
                self.inner.remote.classify(item, &credential).await?
            }
        };

        let result = raw.normalize();
        let elapsed = start.elapsed();
        debug!(
            mode = %mode,
            label = %raw.label,
            bucket = %result.bucket,
            confidence = result.confidence,
            elapsed_ms = elapsed.as_millis() as u64,
            "classified"
        );
        Ok(TaggedResult {
            mode,
            item: item.to_string(),
            result,
            elapsed,
        })
    }
}
