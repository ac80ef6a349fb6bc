//! Configuration maintenance: listing, prompt mode, credentials, encryption
//! and the secrets file

use nexpush_repo::{ConfigStore, Prompter, unlock_encryption};
use std::path::Path;

use crate::error::Result;

fn confirm<P: Prompter + ?Sized>(prompter: &mut P, question: &str) -> Result<bool> {
    Ok(prompter.ask_text(question)? == "y")
}

/// `key: url` for every configured repository
pub fn repo_lines<S: ConfigStore + ?Sized>(store: &S) -> Vec<String> {
    store
        .repos()
        .into_iter()
        .map(|(key, url)| format!("{}: {}", key, url.unwrap_or_default()))
        .collect()
}

/// Print every configured repository
pub fn list_repos<S: ConfigStore + ?Sized>(store: &S) -> Result<()> {
    println!();
    for line in repo_lines(store) {
        println!("{}", line);
    }
    println!();
    Ok(())
}

/// Switch to always-prompt mode after confirmation; this deletes all
/// stored credentials
pub fn always_prompt<S, P>(store: &mut S, prompter: &mut P) -> Result<()>
where
    S: ConfigStore + ?Sized,
    P: Prompter + ?Sized,
{
    if confirm(
        prompter,
        "setup nexus to always prompt username/passwords and delete all current credentials ? (y/N)",
    )? {
        store.set_always_prompt(true)?;
    }
    Ok(())
}

/// Leave always-prompt mode
pub fn store_credentials<S, P>(store: &mut S, prompter: &mut P) -> Result<()>
where
    S: ConfigStore + ?Sized,
    P: Prompter + ?Sized,
{
    prompter.say("setup nexus to store username/passwords");
    store.set_always_prompt(false)?;
    Ok(())
}

/// Delete all stored credentials after confirmation
pub fn clear_all<S, P>(store: &mut S, prompter: &mut P) -> Result<()>
where
    S: ConfigStore + ?Sized,
    P: Prompter + ?Sized,
{
    if confirm(prompter, "delete all current credentials ? (y/N)")? {
        store.clear_credentials()?;
    }
    Ok(())
}

pub fn encrypt<S, P>(store: &mut S, prompter: &mut P) -> Result<()>
where
    S: ConfigStore + ?Sized,
    P: Prompter + ?Sized,
{
    unlock_encryption(store, prompter)?;
    store.encrypt()?;
    tracing::debug!("encrypted credentials in {}", store.location().display());
    Ok(())
}

pub fn decrypt<S, P>(store: &mut S, prompter: &mut P) -> Result<()>
where
    S: ConfigStore + ?Sized,
    P: Prompter + ?Sized,
{
    unlock_encryption(store, prompter)?;
    store.decrypt()?;
    tracing::debug!("decrypted credentials in {}", store.location().display());
    Ok(())
}

/// Move credentials into `secrets`, or back into the configuration file
pub fn secrets<S: ConfigStore + ?Sized>(store: &mut S, secrets: Option<&Path>) -> Result<()> {
    let secrets = secrets.map(std::path::absolute).transpose()?;
    store.relocate_secrets(secrets.as_deref())?;
    Ok(())
}
