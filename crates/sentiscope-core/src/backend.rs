//! Seams between the orchestrator and the things it drives.
//!
//! The local side is split in two: a [`PipelineLoader`] that may take tens of
//! seconds (model fetch and setup) and the [`LocalPipeline`] it produces, which
//! runs synchronous inference. The remote side is a single async call.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::sentiment::RawOutput;

/// A loaded in-process classifier.
///
/// `classify` is CPU-bound and is run on the blocking thread pool by callers.
pub trait LocalPipeline: Send + Sync {
    fn classify(&self, text: &str) -> anyhow::Result<RawOutput>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// Builds a [`LocalPipeline`]; called at most once per successful load.
#[async_trait]
pub trait PipelineLoader: Send + Sync {
    async fn load(&self) -> anyhow::Result<Arc<dyn LocalPipeline>>;
}

/// A hosted model that classifies one item per HTTP request.
#[async_trait]
pub trait RemoteModel: Send + Sync {
    async fn classify(
        &self,
        item: &str,
        credential: &Credential,
    ) -> Result<RawOutput, RemoteError>;
}

/// Opaque API key for the remote backend.
///
/// `Debug` is redacted so the secret cannot leak through logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a key. Blank keys are treated as absent.
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into();
        let trimmed = secret.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The raw secret, for the `Authorization` header only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Source of credentials, looked up by key on every remote request.
pub trait CredentialStore: Send + Sync {
    fn credential(&self, key: &str) -> Option<Credential>;
}
