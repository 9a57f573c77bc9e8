//! Fire-and-forget telemetry events.
//!
//! A [`TelemetrySink`] accepts events synchronously and never reports failure:
//! delivery happens in the background, and a missing or broken sink must not
//! change what the user sees or delay a classification result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::mode::BackendMode;
use crate::sentiment::ClassificationResult;

/// Event name recorded for each successful classification.
pub const CLASSIFICATION_EVENT: &str = "classification";

/// A metadata value: free text or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Number(f64),
    Text(String),
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for MetaValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<f32> for MetaValue {
    fn from(n: f32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u64> for MetaValue {
    fn from(n: u64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<usize> for MetaValue {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

/// A named event with a variant tag and flat metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    #[serde(rename = "event")]
    pub event_name: String,
    pub variant: String,
    pub meta: BTreeMap<String, MetaValue>,
}

impl TelemetryEvent {
    pub fn new(event_name: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            variant: variant.into(),
            meta: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// The event recorded after a successful classification.
    ///
    /// The variant is the mode that produced the result. The item text itself
    /// is not recorded, only its length.
    pub fn classification(
        mode: BackendMode,
        result: &ClassificationResult,
        item_chars: usize,
        latency_ms: u64,
    ) -> Self {
        Self::new(CLASSIFICATION_EVENT, mode.as_str())
            .with("bucket", result.bucket.as_str())
            .with("confidence", result.confidence)
            .with("item_chars", item_chars)
            .with("latency_ms", latency_ms)
    }
}

/// Best-effort event recorder.
pub trait TelemetrySink: Send + Sync {
    /// Hand an event to the sink. Must return promptly and never panic.
    fn record(&self, event: TelemetryEvent);
}

/// Sink that discards everything; used when no telemetry endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn record(&self, event: TelemetryEvent) {
        tracing::trace!(event = %event.event_name, "telemetry disabled, event dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::normalize;

    #[test]
    fn classification_event_shape() {
        let result = normalize("POSITIVE", 0.98);
        let event = TelemetryEvent::classification(BackendMode::Local, &result, 14, 12);
        assert_eq!(event.event_name, CLASSIFICATION_EVENT);
        assert_eq!(event.variant, "local");
        assert_eq!(event.meta["bucket"], MetaValue::Text("positive".into()));
        assert_eq!(event.meta["item_chars"], MetaValue::Number(14.0));
    }

    #[test]
    fn serializes_flat_meta() {
        let event = TelemetryEvent::new("classification", "remote")
            .with("bucket", "neutral")
            .with("latency_ms", 250u64);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "classification");
        assert_eq!(json["variant"], "remote");
        assert_eq!(json["meta"]["bucket"], "neutral");
        assert_eq!(json["meta"]["latency_ms"], 250.0);
    }
}
