//! nexpush - upload gems to a rubygems repository on a Nexus server

use clap::Parser;
use console::style;
use miette::IntoDiagnostic;
use nexpush_repo::{FileConfigStore, ProxySetting, SslVerifyMode, UploadOptions};
use std::path::PathBuf;
use tracing_subscriber::filter::{Directive, EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;

mod commands;
mod error;
mod exit_codes;
mod prompt;

use commands::Mode;
use error::Result;
use prompt::TerminalPrompter;

#[derive(Parser, Debug)]
#[command(name = "nexpush")]
#[command(version)]
#[command(about = "Upload gems to a rubygems repository on a Nexus server", long_about = None)]
#[command(after_help = "Some options (listing, prompt mode, credentials, encryption, secrets) do not take a GEM.")]
struct Cli {
    /// Built gem(s) to upload
    #[arg(value_name = "GEM")]
    gems: Vec<PathBuf>,

    /// Repository key in the configuration
    #[arg(short = 'r', long = "repo", value_name = "KEY")]
    repo: Option<String>,

    /// Ask again for the repository URL and credentials
    #[arg(short = 'c', long = "clear-repo")]
    clear_repo: bool,

    /// URL of the rubygems repository on the Nexus server
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Credentials as USER:PASS; ':' deletes the stored ones
    #[arg(long, value_name = "USER:PASS")]
    credential: Option<String>,

    /// Configuration file (default ~/.gem/nexus)
    #[arg(long = "nexus-config", env = "NEXPUSH_CONFIG", value_name = "FILE")]
    nexus_config: Option<PathBuf>,

    /// Do not verify the server certificate
    #[arg(long)]
    ignore_ssl_errors: bool,

    /// Proxy for every request, overriding the environment
    #[arg(short = 'p', long = "http-proxy", value_name = "URL", conflicts_with = "no_http_proxy")]
    http_proxy: Option<String>,

    /// Never use a proxy
    #[arg(long)]
    no_http_proxy: bool,

    /// List all configured repositories with their URLs
    #[arg(long)]
    all_repos: bool,

    /// Delete all stored credentials
    #[arg(long)]
    clear_all: bool,

    /// Move the credentials to this secrets file
    #[arg(long, value_name = "FILE", conflicts_with = "no_secrets")]
    secrets: Option<PathBuf>,

    /// Move the credentials back into the configuration file and delete the secrets file
    #[arg(long)]
    no_secrets: bool,

    /// Always prompt for credentials instead of storing them
    #[arg(long, conflicts_with = "no_prompt")]
    prompt: bool,

    /// Store credentials again
    #[arg(long)]
    no_prompt: bool,

    /// Encrypt the stored credentials with a master password
    #[arg(long, conflicts_with = "no_encrypt")]
    encrypt: bool,

    /// Decrypt the stored credentials
    #[arg(long)]
    no_encrypt: bool,

    /// Log filter, e.g. `debug` or `nexpush_repo=trace`
    #[arg(long, default_value = "warn")]
    loglevel: String,

    /// Shorthand for `--loglevel debug`
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn setup_logging(&self) -> miette::Result<()> {
        let directive: Directive = if self.verbose {
            LevelFilter::DEBUG.into()
        } else {
            self.loglevel.parse().into_diagnostic()?
        };
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(
                EnvFilter::builder()
                    .with_default_directive(directive)
                    .from_env_lossy(),
            )
            .init();
        Ok(())
    }

    fn mode(&self) -> Mode {
        if self.all_repos {
            Mode::ListRepos
        } else if self.prompt {
            Mode::AlwaysPrompt
        } else if self.no_prompt {
            Mode::StoreCredentials
        } else if self.clear_all {
            Mode::ClearAll
        } else if self.encrypt {
            Mode::Encrypt
        } else if self.no_encrypt {
            Mode::Decrypt
        } else if self.no_secrets {
            Mode::Secrets(None)
        } else if let Some(secrets) = &self.secrets {
            Mode::Secrets(Some(secrets.clone()))
        } else {
            Mode::Upload
        }
    }

    fn upload_options(&self) -> UploadOptions {
        let proxy = if self.no_http_proxy {
            ProxySetting::Disabled
        } else if let Some(url) = &self.http_proxy {
            ProxySetting::Url(url.clone())
        } else {
            ProxySetting::Unset
        };

        let mut options = UploadOptions {
            clear: self.clear_repo,
            url: self.url.clone(),
            credential: self.credential.clone(),
            ssl_verify_mode: self.ignore_ssl_errors.then_some(SslVerifyMode::None),
            proxy,
            ..UploadOptions::default()
        };
        if let Some(repo) = &self.repo {
            options.repo_key = repo.clone();
        }
        options
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mode = cli.mode();
    tracing::debug!("mode {:?}", mode);

    if !mode.takes_gems() {
        if let Some(names) = commands::probe_gem_names(&cli.gems) {
            let names: Vec<_> = names.iter().map(|n| n.display().to_string()).collect();
            eprintln!(
                "{} given gemfile(s) {} get ignored due to the options used",
                style("warning:").yellow().bold(),
                names.join(" ")
            );
        }
    }

    let mut store = FileConfigStore::open(cli.nexus_config.as_deref())?;
    let mut prompter = TerminalPrompter::new();

    match mode {
        Mode::ListRepos => commands::maintenance::list_repos(&store),
        Mode::AlwaysPrompt => commands::maintenance::always_prompt(&mut store, &mut prompter),
        Mode::StoreCredentials => {
            commands::maintenance::store_credentials(&mut store, &mut prompter)
        }
        Mode::ClearAll => commands::maintenance::clear_all(&mut store, &mut prompter),
        Mode::Encrypt => commands::maintenance::encrypt(&mut store, &mut prompter),
        Mode::Decrypt => commands::maintenance::decrypt(&mut store, &mut prompter),
        Mode::Secrets(path) => commands::maintenance::secrets(&mut store, path.as_deref()),
        Mode::Upload => {
            commands::upload::run(&mut store, &mut prompter, cli.upload_options(), &cli.gems)
        }
    }
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();

    if let Err(e) = cli.setup_logging() {
        eprintln!("{:?}", e);
        std::process::exit(exit_codes::ERROR);
    }

    let code = match run(&cli) {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            let code = e.exit_code();
            eprintln!("{:?}", miette::Report::new(e));
            code
        }
    };
    std::process::exit(code);
}
