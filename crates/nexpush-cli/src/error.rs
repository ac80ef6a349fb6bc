//! CLI error types with exit code handling

use miette::Diagnostic;
use nexpush_repo::RepoError;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Configuration, credential, proxy or transport failure
    #[error("{message}")]
    #[diagnostic(code(nexpush::cli::repository))]
    Repository {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Missing or contradictory arguments
    #[error("Usage error: {message}")]
    #[diagnostic(code(nexpush::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// The server did not accept a gem
    #[error("Upload of {gem} failed: {reason}")]
    #[diagnostic(code(nexpush::cli::upload))]
    UploadFailed {
        gem: String,
        reason: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (terminal, file system)
    #[error("IO error: {message}")]
    #[diagnostic(code(nexpush::cli::io))]
    Io { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Repository { .. }
            | CliError::Usage { .. }
            | CliError::UploadFailed { .. }
            | CliError::Io { .. } => exit_codes::ERROR,
        }
    }

    /// Create a usage error with help text
    pub fn usage_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create an upload failure; `skipped` gems were never attempted
    pub fn upload_failed(gem: impl Into<String>, reason: impl Into<String>, skipped: usize) -> Self {
        Self::UploadFailed {
            gem: gem.into(),
            reason: reason.into(),
            help: (skipped > 0).then(|| format!("{} remaining gem(s) were not uploaded", skipped)),
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        let help = match &err {
            RepoError::Configuration { .. } => {
                Some("pass --url URL or answer the URL prompt with a full URL".to_string())
            }
            RepoError::InvalidProxy { .. } => {
                Some("fix --http-proxy or the http_proxy/https_proxy variables".to_string())
            }
            RepoError::Transport { .. } | RepoError::Timeout { .. } => Some(
                "check the repository URL and the proxy settings (--http-proxy, --no-http-proxy)"
                    .to_string(),
            ),
            RepoError::InvalidCredential { .. } => {
                Some("use USER:PASS; ':' deletes the stored credentials".to_string())
            }
            RepoError::Locked | RepoError::Decryption { .. } => {
                Some("check the encryption password".to_string())
            }
            _ => None,
        };
        CliError::Repository {
            message: err.to_string(),
            help,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
