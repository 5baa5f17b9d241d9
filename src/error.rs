use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Input not found: {}", .0.display())]
    MissingInputResource(PathBuf),

    #[error("Sheet not found: {0}")]
    MissingSheet(String),

    #[error("No CSV file found in feed container: {}", .0.display())]
    MissingFeedFile(PathBuf),

    #[error("Failed to decode registry feed as {encoding}: {detail}")]
    DecodeFailure { encoding: String, detail: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LinkError {
    /// Decode failures are the only errors the scan retries under the fallback encoding.
    pub fn is_decode_failure(&self) -> bool {
        matches!(self, LinkError::DecodeFailure { .. })
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
