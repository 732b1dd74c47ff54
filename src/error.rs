use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single completion call against one credential.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
    /// Explicit retry interval advertised by the provider, if any.
    pub retry_after: Option<Duration>,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }
}

#[derive(Debug, Error)]
pub enum RotorError {
    #[error("no credentials configured")]
    NoCredentials,
    #[error("all {total} credentials are currently cooling down ({cooling} in cooldown)")]
    AllCoolingDown { total: usize, cooling: usize },
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output log is not a valid JSON segment array: {0}")]
    MalformedLog(PathBuf),
}

#[derive(Debug, Error)]
pub enum AnnotatorError {
    #[error("job directory is locked by another process: {0}")]
    Locked(PathBuf),
}
