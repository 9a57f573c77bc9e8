//! Fire-and-forget telemetry over HTTP.
//!
//! Each event is POSTed as a single JSON document with a `text/plain` content
//! type, so browser-style collectors accept it without a preflight. Delivery is
//! never awaited by the caller and failures are only logged at debug level.

use chrono::Utc;
use sentiscope_core::{TelemetryEvent, TelemetrySink};
use serde::Serialize;
use tracing::debug;

const CONTENT_TYPE: &str = "text/plain;charset=utf-8";

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(flatten)]
    event: &'a TelemetryEvent,
    ts: String,
}

/// Telemetry sink that POSTs events to a collector URL.
#[derive(Clone)]
pub struct HttpTelemetrySink {
    client: reqwest::Client,
    url: String,
}

impl HttpTelemetrySink {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    fn body(event: &TelemetryEvent) -> Option<String> {
        let envelope = Envelope {
            event,
            ts: Utc::now().to_rfc3339(),
        };
        serde_json::to_string(&envelope).ok()
    }
}

impl TelemetrySink for HttpTelemetrySink {
    fn record(&self, event: TelemetryEvent) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(event = %event.event_name, "no runtime, telemetry event dropped");
            return;
        };
        let Some(body) = Self::body(&event) else {
            debug!(event = %event.event_name, "telemetry event not serializable, dropped");
            return;
        };

        let client = self.client.clone();
        let url = self.url.clone();
        handle.spawn(async move {
            let sent = client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
                .body(body)
                .send()
                .await;
            match sent {
                Ok(resp) if resp.status().is_success() => {
                    debug!(event = %event.event_name, "telemetry delivered");
                }
                Ok(resp) => {
                    debug!(event = %event.event_name, status = %resp.status(), "telemetry rejected");
                }
                Err(e) => {
                    debug!(event = %event.event_name, error = %e, "telemetry delivery failed");
                }
            }
        });
    }
}
