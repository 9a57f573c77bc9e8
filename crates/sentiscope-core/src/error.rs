use thiserror::Error;

/// Failure of the remote backend's single HTTP attempt.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("remote model returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("remote request failed: {0}")]
    Transport(String),
    #[error("unexpected response from remote model: {0}")]
    MalformedResponse(String),
}

/// The local pipeline was used out of order, or the model itself failed.
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    #[error("local model used before initialization completed")]
    NotInitialized,
    #[error("local inference failed: {0}")]
    Failed(String),
}

/// Local model load failure. Cloned to every caller joined on the same load.
#[derive(Debug, Clone, Error)]
#[error("local model failed to load: {0}")]
pub struct InitError(pub String);

/// Everything that can go wrong on the classification path.
///
/// The `Display` text of each variant is the status line shown to the user.
#[derive(Debug, Clone, Error)]
pub enum ClassifyError {
    #[error("nothing to classify: the item is empty")]
    EmptyItem,
    #[error("a classification is already running; wait for it to finish")]
    Busy,
    #[error("the local model is still loading; try again once it is ready")]
    NotReady,
    #[error("remote mode needs an API key: set `{key}` and try again")]
    MissingCredential { key: String },
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}
