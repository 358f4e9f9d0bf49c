//! Error types for pf-core

use thiserror::Error;

/// pf-core error type
///
/// Fetch failures keep the raw stdout/stderr of the rendering process so a
/// bad run can be diagnosed without re-running it.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported protocol for {0:?}")]
    UnsupportedProtocol(String),

    #[error("Failed to spawn rendering process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Rendering process exceeded supervisory timeout ({seconds}s)")]
    Timeout {
        seconds: u64,
        stdout: String,
        stderr: String,
    },

    #[error("Invalid output from rendering process")]
    InvalidOutput { stdout: String, stderr: String },
}

impl FetchError {
    /// Raw stdout captured before the failure, when the error carries one.
    pub fn stdout(&self) -> Option<&str> {
        match self {
            FetchError::Timeout { stdout, .. } | FetchError::InvalidOutput { stdout, .. } => {
                Some(stdout)
            }
            _ => None,
        }
    }

    /// Raw stderr captured before the failure, when the error carries one.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            FetchError::Timeout { stderr, .. } | FetchError::InvalidOutput { stderr, .. } => {
                Some(stderr)
            }
            _ => None,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, FetchError>;
