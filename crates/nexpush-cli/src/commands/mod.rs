//! Command implementations

pub mod maintenance;
pub mod upload;

use std::path::PathBuf;

/// What an invocation does
///
/// Selected from the flags in this order; the first match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// `--all-repos`
    ListRepos,
    /// `--prompt`
    AlwaysPrompt,
    /// `--no-prompt`
    StoreCredentials,
    /// `--clear-all`
    ClearAll,
    /// `--encrypt`
    Encrypt,
    /// `--no-encrypt`
    Decrypt,
    /// `--secrets FILE` or `--no-secrets`
    Secrets(Option<PathBuf>),
    Upload,
}

impl Mode {
    /// Whether positional gem paths are used
    pub fn takes_gems(&self) -> bool {
        matches!(self, Mode::Upload)
    }
}

/// Gem paths from the positional arguments, if any were given
pub fn probe_gem_names(gems: &[PathBuf]) -> Option<Vec<PathBuf>> {
    if gems.is_empty() {
        None
    } else {
        Some(gems.to_vec())
    }
}
