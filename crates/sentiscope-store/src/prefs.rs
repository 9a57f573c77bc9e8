//! Persisted preferences and credential sources.
//!
//! The preference file is a small JSON document:
//!
//! ```json
//! { "mode": "local", "credentials": { "api_key": "sk-..." } }
//! ```
//!
//! It is re-read on every credential lookup, so a key stored by another
//! process (`sentiscope prefs set-key`) takes effect without a restart.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sentiscope_core::{BackendMode, Credential, CredentialStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::StoreError;

/// Contents of the preference file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<BackendMode>,
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,
}

/// JSON preference file on disk.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file. A missing file yields default preferences.
    pub fn load(&self) -> Result<Preferences, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(json) if json.trim().is_empty() => Ok(Preferences::default()),
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Preferences::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the file, replacing it atomically.
    pub fn save(&self, prefs: &Preferences) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(prefs)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "preferences saved");
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut Preferences)) -> Result<(), StoreError> {
        let mut prefs = self.load()?;
        f(&mut prefs);
        self.save(&prefs)
    }

    /// Stored startup mode, if any.
    pub fn mode(&self) -> Result<Option<BackendMode>, StoreError> {
        Ok(self.load()?.mode)
    }

    pub fn set_mode(&self, mode: BackendMode) -> Result<(), StoreError> {
        self.update(|prefs| prefs.mode = Some(mode))?;
        info!(mode = %mode, "default mode stored");
        Ok(())
    }

    pub fn set_credential(&self, key: &str, credential: &Credential) -> Result<(), StoreError> {
        self.update(|prefs| {
            prefs
                .credentials
                .insert(key.to_string(), credential.expose().to_string());
        })?;
        info!(key, "credential stored");
        Ok(())
    }

    /// Remove a stored credential. Returns whether one was present.
    pub fn clear_credential(&self, key: &str) -> Result<bool, StoreError> {
        let mut prefs = self.load()?;
        let removed = prefs.credentials.remove(key).is_some();
        if removed {
            self.save(&prefs)?;
            info!(key, "credential removed");
        }
        Ok(removed)
    }
}

impl CredentialStore for PreferenceStore {
    fn credential(&self, key: &str) -> Option<Credential> {
        match self.load() {
            Ok(prefs) => prefs
                .credentials
                .get(key)
                .and_then(|value| Credential::new(value.as_str())),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "preference file unreadable");
                None
            }
        }
    }
}

/// Credentials from environment variables named `<prefix><KEY>`, with the key
/// uppercased (`api_key` → `SENTISCOPE_API_KEY`).
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    prefix: String,
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::with_prefix("SENTISCOPE_")
    }
}

impl EnvCredentials {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn var_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.to_ascii_uppercase())
    }
}

impl CredentialStore for EnvCredentials {
    fn credential(&self, key: &str) -> Option<Credential> {
        std::env::var(self.var_name(key))
            .ok()
            .and_then(Credential::new)
    }
}

/// Ordered list of credential sources; the first hit wins.
#[derive(Default, Clone)]
pub struct CredentialChain {
    sources: Vec<Arc<dyn CredentialStore>>,
}

impl CredentialChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: Arc<dyn CredentialStore>) -> Self {
        self.sources.push(source);
        self
    }
}

impl CredentialStore for CredentialChain {
    fn credential(&self, key: &str) -> Option<Credential> {
        self.sources.iter().find_map(|source| source.credential(key))
    }
}
