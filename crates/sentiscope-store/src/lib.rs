//! Storage layer: classifiable datasets (text or Parquet), the preference
//! file, and credential sources.

mod error;
pub use error::StoreError;

pub mod dataset;
pub mod prefs;

pub use dataset::Dataset;
pub use prefs::{CredentialChain, EnvCredentials, PreferenceStore, Preferences};
