// src/error.rs
use thiserror::Error;

/// Failure of one source client or AI relay call.
///
/// None of these are fatal: the orchestrator logs them and omits the patch.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{source_name} HTTP {status}")]
    Status { source_name: String, status: u16 },

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("no data: {0}")]
    Empty(String),

    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::Parse(e.to_string())
    }
}

impl From<csv::Error> for SourceError {
    fn from(e: csv::Error) -> Self {
        SourceError::Parse(e.to_string())
    }
}

impl From<std::num::ParseFloatError> for SourceError {
    fn from(e: std::num::ParseFloatError) -> Self {
        SourceError::Parse(e.to_string())
    }
}

impl From<regex::Error> for SourceError {
    fn from(e: regex::Error) -> Self {
        SourceError::Parse(e.to_string())
    }
}

/// Failure of the local key-value storage. Always swallowed by callers.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SourceError>;
