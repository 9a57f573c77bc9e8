//! HTTP layer: hosted chat-completion backend and the telemetry sink.

pub mod remote;
pub mod telemetry;

pub use remote::{ChatCompletionsBackend, parse_reply};
pub use telemetry::HttpTelemetrySink;
