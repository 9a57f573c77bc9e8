pub mod backend;
pub mod error;
pub mod mode;
pub mod schema;
pub mod sentiment;
pub mod telemetry;

pub use backend::{Credential, CredentialStore, LocalPipeline, PipelineLoader, RemoteModel};
pub use error::{ClassifyError, InferenceError, InitError, RemoteError};
pub use mode::{BackendMode, ParseModeError};
pub use sentiment::{ClassificationResult, RawOutput, SentimentBucket, normalize};
pub use telemetry::{MetaValue, NoopSink, TelemetryEvent, TelemetrySink};
