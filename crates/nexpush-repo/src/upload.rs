//! Upload orchestration
//!
//! One [`UploadOrchestrator`] drives a single invocation:
//!
//! ```text
//! Init -> Configured -> Uploading(0) -> Uploading(1) -> ... -> Done
//!                              \______________________________-> Aborted
//! ```
//!
//! `ensure_configured` settles the encryption password, the repository URL
//! and the authorization before any request is made. `upload_all` then PUTs
//! each artifact in order and stops at the first one that does not succeed.

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue};
use std::path::{Path, PathBuf};
use url::Url;

use crate::config::{ConfigStore, DEFAULT_REPO_KEY, SslVerifyMode};
use crate::credentials::{AuthResolver, Prompter, unlock_encryption};
use crate::error::{RepoError, Result};
use crate::http::{Method, RawResponse, UploadClient};
use crate::proxy::{ProxyResolver, ProxySetting};

/// Classified server response for one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// 2xx, with `"<reason> <basename>"`
    Success(String),
    /// 400
    DeploymentRejected,
    /// 401
    Unauthorized,
    /// 500
    ServerError,
    /// Any other non-2xx status, redirects included
    OtherFailure { status: u16, message: String },
}

impl UploadOutcome {
    /// Classify `response` for the artifact called `name`
    pub fn classify(response: &RawResponse, name: &str) -> Self {
        match response.status {
            400 => UploadOutcome::DeploymentRejected,
            401 => UploadOutcome::Unauthorized,
            500 => UploadOutcome::ServerError,
            _ => {
                let message = format!("{} {}", response.message, name);
                if response.is_success() {
                    UploadOutcome::Success(message)
                } else {
                    UploadOutcome::OtherFailure {
                        status: response.status,
                        message,
                    }
                }
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success(_))
    }

    /// Line reported to the operator
    pub fn message(&self) -> String {
        match self {
            UploadOutcome::Success(message) => message.clone(),
            UploadOutcome::DeploymentRejected => {
                "something went wrong - maybe (re)deployment is not allowed".to_string()
            }
            UploadOutcome::Unauthorized => "Unauthorized".to_string(),
            UploadOutcome::ServerError => "something went wrong".to_string(),
            UploadOutcome::OtherFailure { message, .. } => message.clone(),
        }
    }
}

/// Per-invocation choices
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Repository slot in the configuration
    pub repo_key: String,
    /// Ask for URL and credentials again
    pub clear: bool,
    /// URL to store instead of prompting
    pub url: Option<String>,
    /// `user:pass` to use instead of prompting
    pub credential: Option<String>,
    /// Overrides the stored TLS mode
    pub ssl_verify_mode: Option<SslVerifyMode>,
    pub proxy: ProxySetting,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            repo_key: DEFAULT_REPO_KEY.to_string(),
            clear: false,
            url: None,
            credential: None,
            ssl_verify_mode: None,
            proxy: ProxySetting::Unset,
        }
    }
}

/// Orchestrator progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Init,
    Configured,
    /// Index of the artifact in flight
    Uploading(usize),
    Done,
    Aborted,
}

/// Result of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub uploaded: Vec<PathBuf>,
    /// Artifact that stopped the batch
    pub failed: Option<(PathBuf, UploadOutcome)>,
    /// Artifacts never attempted
    pub skipped: Vec<PathBuf>,
}

impl UploadSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }
}

/// Drives configuration and upload for one invocation
pub struct UploadOrchestrator<'a, S: ?Sized, P: ?Sized> {
    store: &'a mut S,
    prompter: &'a mut P,
    options: UploadOptions,
    proxy: ProxyResolver,
    authorization: Option<String>,
    state: UploadState,
}

impl<'a, S, P> UploadOrchestrator<'a, S, P>
where
    S: ConfigStore + ?Sized,
    P: Prompter + ?Sized,
{
    /// Create an orchestrator reading proxy variables from the environment
    pub fn new(store: &'a mut S, prompter: &'a mut P, options: UploadOptions) -> Self {
        let proxy = ProxyResolver::from_env(options.proxy.clone());
        Self {
            store,
            prompter,
            options,
            proxy,
            authorization: None,
            state: UploadState::Init,
        }
    }

    /// Replace the proxy resolver
    pub fn with_proxy_resolver(mut self, proxy: ProxyResolver) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Authorization that requests will carry
    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    /// Settle encryption password, URL and credentials
    pub fn ensure_configured(&mut self) -> Result<()> {
        let repo_key = self.options.repo_key.clone();

        if self.store.get(&repo_key)?.encrypted {
            unlock_encryption(&mut *self.store, &mut *self.prompter)?;
        }

        if self.store.get(&repo_key)?.url.is_none() || self.options.clear {
            self.configure_url(&repo_key)?;
        }

        let config = self.store.get(&repo_key)?;
        if config.authorization.is_none() || config.always_prompt || self.options.clear {
            self.authorization = AuthResolver::new(self.options.credential.clone()).sign_in(
                &mut *self.store,
                &repo_key,
                &mut *self.prompter,
            )?;
        } else {
            self.authorization = config.authorization;
        }

        self.state = UploadState::Configured;
        Ok(())
    }

    fn configure_url(&mut self, repo_key: &str) -> Result<()> {
        let url = match &self.options.url {
            Some(url) => url.clone(),
            None => {
                self.prompter
                    .say("Enter the URL of the rubygems repository on a Nexus server");
                self.prompter.ask_text("URL: ")?
            }
        };
        let url = url.trim();

        match Url::parse(url) {
            Ok(parsed) if parsed.host_str().is_some() => {
                self.store.set_url(repo_key, url)?;
                self.prompter.say(&format!(
                    "The Nexus URL has been stored in {}",
                    self.store.location().display()
                ));
                Ok(())
            }
            _ => Err(RepoError::Configuration {
                message: "no URL given".to_string(),
            }),
        }
    }

    fn client(&self) -> Result<UploadClient> {
        let config = self.store.get(&self.options.repo_key)?;
        Ok(
            UploadClient::new(&config, self.options.ssl_verify_mode, self.proxy.clone())?
                .with_authorization(self.authorization.clone()),
        )
    }

    /// PUT every artifact, in order, stopping at the first failure
    ///
    /// `on_outcome` sees each classified response as it arrives. A transport
    /// or file error aborts the batch and is returned as `Err`; a failed
    /// status is reported in the summary.
    pub fn upload_all<F>(&mut self, artifacts: &[PathBuf], mut on_outcome: F) -> Result<UploadSummary>
    where
        F: FnMut(&Path, &UploadOutcome),
    {
        if self.state == UploadState::Init {
            self.ensure_configured()?;
        }
        let client = self.client()?;
        let mut summary = UploadSummary::default();

        for (index, path) in artifacts.iter().enumerate() {
            self.state = UploadState::Uploading(index);

            let outcome = match upload_one(&client, path) {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.state = UploadState::Aborted;
                    return Err(e);
                }
            };
            on_outcome(path, &outcome);

            if outcome.is_success() {
                summary.uploaded.push(path.clone());
            } else {
                tracing::debug!("aborting batch after {}", path.display());
                summary.failed = Some((path.clone(), outcome));
                summary.skipped = artifacts[index + 1..].to_vec();
                self.state = UploadState::Aborted;
                return Ok(summary);
            }
        }

        self.state = UploadState::Done;
        Ok(summary)
    }
}

fn upload_one(client: &UploadClient, path: &Path) -> Result<UploadOutcome> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let body = std::fs::read(path).map_err(|source| RepoError::Artifact {
        path: path.display().to_string(),
        source,
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );

    let response = client.request(Method::Put, &format!("gems/{}", name), headers, Some(body))?;
    Ok(UploadOutcome::classify(&response, &name))
}
