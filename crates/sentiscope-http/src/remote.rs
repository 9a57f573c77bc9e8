//! Remote sentiment backend over an OpenAI-compatible chat-completions API.
//!
//! One HTTP request per classification, no retries. The model is instructed to
//! answer with a compact JSON object, but replies are parsed in two tiers so a
//! model that ignores the format still yields a usable [`RawOutput`]:
//!
//! 1. the outermost `{...}` in the reply, parsed as JSON with `label`/`score`;
//! 2. a case-insensitive keyword search for `POSITIVE` / `NEGATIVE`, defaulting
//!    to `NEUTRAL`, with the score fixed at [`FALLBACK_SCORE`].

use async_trait::async_trait;
use sentiscope_core::sentiment::{NEGATIVE, NEUTRAL, POSITIVE};
use sentiscope_core::{Credential, RawOutput, RemoteError, RemoteModel};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Score used when the reply carries no usable score.
pub const FALLBACK_SCORE: f32 = 0.7;

/// Longest error body kept in [`RemoteError::Http`].
const BODY_EXCERPT_CHARS: usize = 200;

const SYSTEM_PROMPT: &str = "\
You are a sentiment classifier. Classify the sentiment of the user's text.

Respond ONLY with a compact JSON object. No markdown fences, no explanation, just raw JSON:
{\"label\": \"POSITIVE\" | \"NEGATIVE\" | \"NEUTRAL\", \"score\": <confidence between 0.0 and 1.0>}";

// ── Wire types ──

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

// ── Client ──

/// Hosted chat model used as a sentiment classifier.
pub struct ChatCompletionsBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl ChatCompletionsBackend {
    /// Create a backend for the given chat-completions endpoint and model name.
    pub fn new(endpoint: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            model,
        }
    }
}

#[async_trait]
impl RemoteModel for ChatCompletionsBackend {
    async fn classify(
        &self,
        item: &str,
        credential: &Credential,
    ) -> Result<RawOutput, RemoteError> {
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            max_tokens: 50,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: item,
                },
            ],
        };

        debug!(endpoint = %self.endpoint, model = %self.model, "sending remote classification");
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Http {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| RemoteError::MalformedResponse(e.to_string()))?;
        let reply = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RemoteError::MalformedResponse("response has no reply text".into()))?;

        let raw = parse_reply(&reply);
        info!(label = %raw.label, score = raw.score, "remote classification complete");
        Ok(raw)
    }
}

// ── Reply parsing ──

/// Interpret a model reply. Never fails.
pub fn parse_reply(reply: &str) -> RawOutput {
    parse_structured(reply).unwrap_or_else(|| {
        debug!("reply is not structured, falling back to keyword search");
        infer_from_text(reply)
    })
}

/// First JSON object in the reply that carries a known label. Text after the
/// object, braces included, is ignored.
fn parse_structured(reply: &str) -> Option<RawOutput> {
    reply.match_indices('{').find_map(|(start, _)| {
        let mut values = serde_json::Deserializer::from_str(&reply[start..]).into_iter::<Value>();
        match values.next()? {
            Ok(value) => labelled(&value),
            Err(_) => None,
        }
    })
}

fn labelled(value: &Value) -> Option<RawOutput> {
    let label = value.get("label")?.as_str()?.trim().to_ascii_uppercase();
    if ![POSITIVE, NEGATIVE, NEUTRAL].contains(&label.as_str()) {
        return None;
    }

    let score = value
        .get("score")
        .and_then(Value::as_f64)
        .map(|s| s.clamp(0.0, 1.0) as f32)
        .unwrap_or(FALLBACK_SCORE);

    Some(RawOutput::new(label, score))
}

fn infer_from_text(reply: &str) -> RawOutput {
    let upper = reply.to_ascii_uppercase();
    let label = if upper.contains(POSITIVE) {
        POSITIVE
    } else if upper.contains(NEGATIVE) {
        NEGATIVE
    } else {
        NEUTRAL
    };
    RawOutput::new(label, FALLBACK_SCORE)
}

fn excerpt(body: &str) -> String {
    match body.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}…", &body[..cut]),
        None => body.to_string(),
    }
}
