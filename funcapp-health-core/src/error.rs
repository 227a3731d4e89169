use thiserror::Error;

/// Errors raised while talking to Azure or writing the report
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Command `{command}` failed (exit code {exit_code:?}): {stderr}")]
    Command {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("Command `{command}` timed out after {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },
    #[error("Unexpected response: {0}")]
    Parse(String),
    #[error("Precondition failed: {0}")]
    Precondition(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HealthError {
    /// Fatal errors stop the whole pass; everything else degrades to "no data".
    pub fn is_fatal(&self) -> bool {
        matches!(self, HealthError::Precondition(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HealthError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, HealthError>;
