use std::path::PathBuf;

use thiserror::Error;

/// A single record or content read failed. Counted and skipped by the scanner.
#[derive(Debug, Error)]
pub enum EntryReadError {
    #[error("failed to read {id}: {source}")]
    Io {
        id: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to walk {path}: {detail}")]
    Walk { path: String, detail: String },
    #[error("content of {id} is not accessible: {reason}")]
    Inaccessible { id: String, reason: String },
    #[error("malformed record {id}: {reason}")]
    Malformed { id: String, reason: String },
}

/// The source could not be listed at all. The scanner seals a failed report.
#[derive(Debug, Error)]
pub enum SourceUnavailableError {
    #[error("source {source_id} not found: {detail}")]
    NotFound { source_id: String, detail: String },
    #[error("source {source_id} rejected the credentials: {detail}")]
    Unauthorized { source_id: String, detail: String },
    #[error("source {source_id} is unreachable: {detail}")]
    Unreachable { source_id: String, detail: String },
    #[error("source {source_id} returned an unreadable listing: {detail}")]
    Invalid { source_id: String, detail: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("text generation unavailable: {0}")]
    Unavailable(String),
    #[error("text generation returned no content")]
    Empty,
}
