use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which inference backend handles classification requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// In-process model, loaded on first use.
    Local,
    /// Hosted chat-completion model reached over HTTP.
    #[default]
    Remote,
}

impl BackendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }

    /// The mode to fall back to when this one becomes unusable.
    pub fn other(&self) -> Self {
        match self {
            Self::Local => Self::Remote,
            Self::Remote => Self::Local,
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown backend mode {0:?} (expected \"local\" or \"remote\")")]
pub struct ParseModeError(String);

impl FromStr for BackendMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}
