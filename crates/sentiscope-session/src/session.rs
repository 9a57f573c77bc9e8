//! The classification session: sample an item, classify it, record telemetry,
//! and turn every outcome into a status line.
//!
//! Nothing on the classification path escapes as an error. Failures become an
//! [`Outcome`] whose status line explains what happened, and the session stays
//! usable afterwards.

use std::sync::Arc;

use sentiscope_core::{BackendMode, ClassifyError, TelemetryEvent, TelemetrySink};
use sentiscope_store::Dataset;
use tracing::{debug, info};

use crate::orchestrator::{ModeChange, Orchestrator, TaggedResult};

/// Result of one classification attempt.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub item: String,
    pub result: Result<TaggedResult, ClassifyError>,
}

impl Outcome {
    /// One line of user-facing text, e.g. `positive (98.0%) via local model`.
    pub fn status_line(&self) -> String {
        match &self.result {
            Ok(tagged) => format!(
                "{} ({:.1}%) via {} model",
                tagged.result.bucket,
                tagged.result.percent(),
                tagged.mode
            ),
            Err(err) => err.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct Session {
    dataset: Dataset,
    orchestrator: Orchestrator,
    telemetry: Arc<dyn TelemetrySink>,
}

impl Session {
    pub fn new(
        dataset: Dataset,
        orchestrator: Orchestrator,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            dataset,
            orchestrator,
            telemetry,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Classify a randomly sampled dataset item.
    pub async fn classify_next(&self) -> Outcome {
        let item = self.dataset.sample(&mut rand::thread_rng()).to_string();
        self.classify_item(item).await
    }

    /// Classify a specific item. Telemetry is recorded on success only.
    pub async fn classify_item(&self, item: String) -> Outcome {
        let result = self.orchestrator.classify(&item).await;
        match &result {
            Ok(tagged) => {
                self.telemetry.record(TelemetryEvent::classification(
                    tagged.mode,
                    &tagged.result,
                    tagged.item.chars().count(),
                    tagged.elapsed.as_millis() as u64,
                ));
                info!(
                    mode = %tagged.mode,
                    bucket = %tagged.result.bucket,
                    confidence = tagged.result.confidence,
                    "classification complete"
                );
            }
            Err(err) => debug!(error = %err, "classification did not complete"),
        }
        Outcome { item, result }
    }

    pub fn set_mode(&self, mode: BackendMode) -> ModeChange {
        self.orchestrator.set_mode(mode)
    }

    /// Mode and engine state, plus the last load error if the model failed.
    pub fn status(&self) -> String {
        let mut line = format!(
            "mode: {}, local model: {}",
            self.orchestrator.mode(),
            self.orchestrator.state()
        );
        if let Some(err) = self.orchestrator.local().last_error() {
            line.push_str(&format!(" ({err})"));
        }
        line
    }
}
