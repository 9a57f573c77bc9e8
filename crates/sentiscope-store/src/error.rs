use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("dataset not found: {0}")]
    NotFound(PathBuf),

    #[error("dataset has no classifiable items: {0}")]
    Empty(String),

    #[error("unsupported dataset format: {0}")]
    UnsupportedFormat(String),

    #[error("column `{0}` missing or not text")]
    MissingColumn(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("preference file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[cfg(feature = "parquet")]
    #[error("parquet error: {0}")]
    Parquet(#[from] ::parquet::errors::ParquetError),
}
