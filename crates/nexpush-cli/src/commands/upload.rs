//! Upload gems

use console::style;
use nexpush_repo::{ConfigStore, Prompter, UploadOptions, UploadOrchestrator};
use std::path::PathBuf;

use crate::error::{CliError, Result};

/// Configure the repository if needed, then upload `gems` in order
pub fn run<S, P>(store: &mut S, prompter: &mut P, options: UploadOptions, gems: &[PathBuf]) -> Result<()>
where
    S: ConfigStore + ?Sized,
    P: Prompter + ?Sized,
{
    let mut orchestrator = UploadOrchestrator::new(store, prompter, options);
    orchestrator.ensure_configured()?;

    if gems.is_empty() {
        return Err(CliError::usage_with_help(
            "no gem files given",
            "usage: nexpush GEM [GEM ...]",
        ));
    }

    println!(
        "Uploading {} gem{} to Nexus...",
        gems.len(),
        if gems.len() == 1 { "" } else { "s" }
    );

    let summary = orchestrator.upload_all(gems, |_, outcome| {
        if outcome.is_success() {
            println!("{}", outcome.message());
        } else {
            println!("{}", style(outcome.message()).red());
        }
    })?;

    tracing::debug!(
        "uploaded {} gem(s), state {:?}",
        summary.uploaded.len(),
        orchestrator.state()
    );

    match summary.failed {
        Some((gem, outcome)) => Err(CliError::upload_failed(
            gem.display().to_string(),
            outcome.message(),
            summary.skipped.len(),
        )),
        None => Ok(()),
    }
}
