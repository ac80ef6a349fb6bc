//! Error types for repository operations

use thiserror::Error;

/// Repository operation errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Configuration Errors ============
    #[error("Repository configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid proxy URL: {url} - {reason}")]
    InvalidProxy { url: String, reason: String },

    // ============ Network Errors ============
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    // ============ Credential Errors ============
    #[error("Invalid credential: {message}")]
    InvalidCredential { message: String },

    #[error("Could not read input: {message}")]
    Prompt { message: String },

    #[error("Stored credentials are encrypted; the encryption password is required")]
    Locked,

    #[error("Could not decrypt stored credentials: {message}")]
    Decryption { message: String },

    // ============ IO Errors ============
    #[error("Could not read artifact {path}: {source}")]
    Artifact {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl RepoError {
    /// Map a transport failure for `url` into the matching variant
    pub fn transport(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RepoError::Timeout {
                url: url.to_string(),
                seconds: crate::http::UPLOAD_TIMEOUT.as_secs(),
            }
        } else if e.is_connect() {
            RepoError::Transport {
                url: url.to_string(),
                message: format!("Connection failed: {}", e),
            }
        } else {
            RepoError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}
