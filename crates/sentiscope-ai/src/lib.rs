//! Local inference layer: a lazily-initialised in-process sentiment pipeline.

pub mod labels;
pub mod lexicon;
pub mod local;

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use onnx::{OnnxLoader, OnnxSentiment};

pub use labels::LabelMap;
pub use lexicon::{LexiconLoader, LexiconPipeline};
pub use local::{InitFuture, LocalBackend, LocalState};
