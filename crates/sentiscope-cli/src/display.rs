//! Terminal rendering of outcomes, notices, and stored preferences.

use std::path::Path;

use sentiscope_core::{ClassifyError, InitError};
use sentiscope_session::Outcome;
use sentiscope_store::Preferences;

const MAX_ITEM_CHARS: usize = 80;

/// Two lines: the (possibly shortened) item, then the status line.
pub fn outcome(outcome: &Outcome) -> String {
    let mut status = outcome.status_line();
    if let Err(ClassifyError::MissingCredential { .. }) = &outcome.result {
        status.push_str(
            "\n  hint: export SENTISCOPE_API_KEY, or run `sentiscope prefs set-key`",
        );
    }
    format!("“{}”\n→ {status}", shorten(&outcome.item))
}

pub fn loading_notice() -> &'static str {
    "loading local model…"
}

pub fn fallback_notice(err: &InitError) -> String {
    format!("{err}; switched to remote mode")
}

pub fn prefs_summary(path: &Path, prefs: &Preferences, credential_key: &str) -> String {
    let mode = prefs
        .mode
        .map(|m| m.to_string())
        .unwrap_or_else(|| "(not set)".into());
    let key = if prefs.credentials.contains_key(credential_key) {
        "stored"
    } else {
        "not stored"
    };
    format!(
        "preferences: {}\n  startup mode: {mode}\n  API key: {key}",
        path.display()
    )
}

fn shorten(item: &str) -> String {
    match item.char_indices().nth(MAX_ITEM_CHARS) {
        Some((cut, _)) => format!("{}…", &item[..cut]),
        None => item.to_string(),
    }
}
