//! Terminal prompts

use console::{Term, style};
use nexpush_repo::{Prompter, RepoError};
use std::io::BufRead;

/// Prompter on the controlling terminal
///
/// Messages and prompts go to stdout. Visible answers are read from stdin,
/// so they can be piped in; hidden answers come from the tty via rpassword,
/// which restores echo when the read ends, failed or not.
pub struct TerminalPrompter {
    term: Term,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

fn prompt_error(err: std::io::Error) -> RepoError {
    RepoError::Prompt {
        message: err.to_string(),
    }
}

impl Prompter for TerminalPrompter {
    fn say(&mut self, message: &str) {
        // Nothing to recover when stdout is gone
        let _ = self.term.write_line(message);
    }

    fn ask_text(&mut self, prompt: &str) -> nexpush_repo::Result<String> {
        self.term
            .write_str(&format!("{} ", style(prompt.trim_end()).bold()))
            .map_err(prompt_error)?;
        self.term.flush().map_err(prompt_error)?;

        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(prompt_error)?;
        Ok(line.trim().to_string())
    }

    fn ask_secret(&mut self, prompt: &str) -> nexpush_repo::Result<String> {
        rpassword::prompt_password(format!("{} ", prompt.trim_end())).map_err(prompt_error)
    }
}
