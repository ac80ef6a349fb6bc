//! nexpush repository pipeline
//!
//! This crate turns a named repository configuration into authenticated
//! uploads against a Nexus rubygems repository:
//!
//! - **Configuration**: per-repository URL, credentials and TLS mode in a
//!   YAML file, with optional secrets file and master-password encryption
//! - **Credentials**: `user:pass` from the command line or an interactive
//!   prompt, turned into a Basic `Authorization` header
//! - **Proxies**: `http_proxy`/`https_proxy`/`no_proxy` resolution per
//!   target URL, with an explicit override
//! - **Uploads**: one blocking `PUT` per artifact; the first failure stops
//!   the batch
//!
//! ## Example
//!
//! ```rust,no_run
//! use nexpush_repo::{FileConfigStore, Prompter, UploadOptions, UploadOrchestrator};
//! # fn example(prompter: &mut dyn Prompter) -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = FileConfigStore::open(None)?;
//! let mut uploader = UploadOrchestrator::new(&mut store, prompter, UploadOptions::default());
//!
//! uploader.ensure_configured()?;
//! let gems = vec![std::path::PathBuf::from("pkg/foo-1.0.gem")];
//! let summary = uploader.upload_all(&gems, |path, outcome| {
//!     println!("{}: {}", path.display(), outcome.message());
//! })?;
//! assert!(summary.is_success());
//! # Ok(())
//! # }
//! ```

pub mod cipher;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod proxy;
pub mod upload;

// Re-exports for convenience
pub use config::{
    ConfigStore, DEFAULT_REPO_KEY, FileConfigStore, RepositoryConfig, SslVerifyMode,
};
pub use credentials::{AuthResolver, Credential, Prompter, unlock_encryption};
pub use error::{RepoError, Result};
pub use http::{Method, RawResponse, UploadClient};
pub use proxy::{ProxyResolver, ProxyScheme, ProxySetting, ProxySpec};
pub use upload::{UploadOptions, UploadOrchestrator, UploadOutcome, UploadState, UploadSummary};
