//! Credential resolution
//!
//! Produces the `Authorization` header for a repository from an explicit
//! `user:pass` string or an interactive prompt, and decides whether the
//! result is persisted in the configuration.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;

use crate::config::ConfigStore;
use crate::error::{RepoError, Result};

/// Interactive input capability
///
/// `ask_secret` must suppress terminal echo while reading and restore it on
/// every exit path, including a failed read.
pub trait Prompter {
    /// Show an informational line
    fn say(&mut self, message: &str);

    /// Read one line of visible input
    fn ask_text(&mut self, prompt: &str) -> Result<String>;

    /// Read one line without echo
    fn ask_secret(&mut self, prompt: &str) -> Result<String>;
}

/// Repository credentials
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// HTTP basic auth
    Basic { username: String, password: String },
    /// Empty username and password: send no authorization at all
    Anonymous,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => {
                f.write_fmt(format_args!("Basic(username={},password=***)", username))
            }
            Self::Anonymous => f.write_str("Anonymous"),
        }
    }
}

impl Credential {
    /// Create basic auth credentials
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        let username = username.into();
        let password = password.into();
        if username.is_empty() && password.is_empty() {
            Credential::Anonymous
        } else {
            Credential::Basic { username, password }
        }
    }

    /// Parse `username:password`, splitting at the first colon. `":"` is
    /// the anonymous credential.
    pub fn parse(token: &str) -> Result<Self> {
        let (username, password) =
            token
                .split_once(':')
                .ok_or_else(|| RepoError::InvalidCredential {
                    message: "expected the format \"Username:Password\"".to_string(),
                })?;
        Ok(Self::basic(username, password))
    }

    /// `Basic <base64(username:password)>`, or `None` when anonymous
    pub fn authorization_header(&self) -> Option<String> {
        match self {
            Credential::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{}:{}", username, password));
                Some(format!("Basic {}", encoded))
            }
            Credential::Anonymous => None,
        }
    }
}

/// Resolves the authorization for a repository
#[derive(Debug, Clone, Default)]
pub struct AuthResolver {
    explicit: Option<String>,
}

impl AuthResolver {
    /// `explicit` is a `user:pass` string given on the command line
    pub fn new(explicit: Option<String>) -> Self {
        Self { explicit }
    }

    /// Obtain credentials, derive the header and store it unless the
    /// configuration is in always-prompt mode.
    ///
    /// Storing overwrites the previous value; the anonymous credential
    /// deletes it.
    pub fn sign_in<S, P>(&self, store: &mut S, repo_key: &str, prompter: &mut P) -> Result<Option<String>>
    where
        S: ConfigStore + ?Sized,
        P: Prompter + ?Sized,
    {
        let credential = match &self.explicit {
            Some(token) => Credential::parse(token)?,
            None => {
                prompter.say("Enter your Nexus credentials");
                let username = prompter.ask_text("Username: ")?;
                let password = prompter.ask_secret("Password: ")?;
                Credential::basic(username, password)
            }
        };
        tracing::debug!("Signing in with {:?}", credential);

        let authorization = credential.authorization_header();

        if !store.get(repo_key)?.always_prompt {
            store.set_authorization(repo_key, authorization.as_deref())?;
            let location = store.location().display().to_string();
            if authorization.is_some() {
                prompter.say(&format!(
                    "Your Nexus credentials have been stored in {}",
                    location
                ));
            } else {
                prompter.say(&format!(
                    "Your Nexus credentials have been deleted from {}",
                    location
                ));
            }
        }

        Ok(authorization)
    }
}

/// Ask for the master password and hand it to the store
pub fn unlock_encryption<S, P>(store: &mut S, prompter: &mut P) -> Result<()>
where
    S: ConfigStore + ?Sized,
    P: Prompter + ?Sized,
{
    let password = prompter.ask_secret("Enter your Nexus encryption credentials (no prompt)")?;
    store.unlock(&password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_REPO_KEY, FileConfigStore};
    use crate::testing::ScriptedPrompter;
    use tempfile::TempDir;

    #[test]
    fn test_authorization_header() {
        let cases = [
            ("user", "pass", "Basic dXNlcjpwYXNz"),
            ("admin", "admin123", "Basic YWRtaW46YWRtaW4xMjM="),
            ("", "secret", "Basic OnNlY3JldA=="),
            ("user", "", "Basic dXNlcjo="),
            ("a:b", "c", "Basic YTpiOmM="),
        ];
        for (user, pass, expected) in cases {
            let header = Credential::basic(user, pass).authorization_header().unwrap();
            assert_eq!(header, expected);
            assert!(!header["Basic ".len()..].contains(char::is_whitespace));
        }
    }

    #[test]
    fn test_long_credentials_have_no_line_breaks() {
        let header = Credential::basic("u".repeat(200), "p".repeat(200))
            .authorization_header()
            .unwrap();
        assert!(!header.contains('\n'));
        assert_eq!(header.matches(' ').count(), 1);
    }

    #[test]
    fn test_parse() {
        assert_eq!(Credential::parse(":").unwrap(), Credential::Anonymous);
        assert_eq!(
            Credential::parse("user:pa:ss").unwrap(),
            Credential::basic("user", "pa:ss")
        );
        assert!(Credential::parse("nocolon").is_err());
        assert_eq!(Credential::Anonymous.authorization_header(), None);
    }

    #[test]
    fn test_debug_hides_password() {
        let debug = format!("{:?}", Credential::basic("user", "hunter2"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_explicit_credential_is_stored() {
        let dir = TempDir::new().unwrap();
        let mut store = FileConfigStore::load_from(&dir.path().join("nexus")).unwrap();
        let mut prompter = ScriptedPrompter::new(&[]);

        let auth = AuthResolver::new(Some("user:pass".to_string()))
            .sign_in(&mut store, DEFAULT_REPO_KEY, &mut prompter)
            .unwrap();

        assert_eq!(auth.as_deref(), Some("Basic dXNlcjpwYXNz"));
        assert_eq!(
            store.get(DEFAULT_REPO_KEY).unwrap().authorization.as_deref(),
            Some("Basic dXNlcjpwYXNz")
        );
        assert!(prompter.asked.is_empty());
    }

    #[test]
    fn test_prompted_credential() {
        let dir = TempDir::new().unwrap();
        let mut store = FileConfigStore::load_from(&dir.path().join("nexus")).unwrap();
        let mut prompter = ScriptedPrompter::new(&["user", "pass"]);

        let auth = AuthResolver::default()
            .sign_in(&mut store, "releases", &mut prompter)
            .unwrap();

        assert_eq!(auth.as_deref(), Some("Basic dXNlcjpwYXNz"));
        assert_eq!(prompter.asked, vec!["Username: ", "Password: "]);
        assert_eq!(prompter.secret_prompts, vec!["Password: "]);
        assert!(prompter.said.iter().any(|m| m.contains("have been stored")));
    }

    #[test]
    fn test_anonymous_clears_stored_authorization() {
        let dir = TempDir::new().unwrap();
        let mut store = FileConfigStore::load_from(&dir.path().join("nexus")).unwrap();
        store.set_authorization(DEFAULT_REPO_KEY, Some("Basic old")).unwrap();
        let mut prompter = ScriptedPrompter::new(&["", ""]);

        let auth = AuthResolver::default()
            .sign_in(&mut store, DEFAULT_REPO_KEY, &mut prompter)
            .unwrap();

        assert_eq!(auth, None);
        assert_eq!(store.get(DEFAULT_REPO_KEY).unwrap().authorization, None);
        assert!(prompter.said.iter().any(|m| m.contains("have been deleted")));
    }

    #[test]
    fn test_always_prompt_does_not_persist() {
        let dir = TempDir::new().unwrap();
        let mut store = FileConfigStore::load_from(&dir.path().join("nexus")).unwrap();
        store.set_always_prompt(true).unwrap();

        let auth = AuthResolver::new(Some("user:pass".to_string()))
            .sign_in(&mut store, DEFAULT_REPO_KEY, &mut ScriptedPrompter::new(&[]))
            .unwrap();

        assert!(auth.is_some());
        assert_eq!(store.get(DEFAULT_REPO_KEY).unwrap().authorization, None);
    }

    #[test]
    fn test_prompt_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let mut store = FileConfigStore::load_from(&dir.path().join("nexus")).unwrap();
        store.set_authorization(DEFAULT_REPO_KEY, Some("Basic old")).unwrap();

        let result = AuthResolver::default().sign_in(
            &mut store,
            DEFAULT_REPO_KEY,
            &mut ScriptedPrompter::new(&["user"]),
        );

        assert!(matches!(result, Err(RepoError::Prompt { .. })));
        assert_eq!(
            store.get(DEFAULT_REPO_KEY).unwrap().authorization.as_deref(),
            Some("Basic old")
        );
    }

    #[test]
    fn test_unlock_encryption_uses_secret_prompt() {
        let dir = TempDir::new().unwrap();
        let mut store = FileConfigStore::load_from(&dir.path().join("nexus")).unwrap();
        let mut prompter = ScriptedPrompter::new(&["master"]);

        unlock_encryption(&mut store, &mut prompter).unwrap();
        store.encrypt().unwrap();

        assert_eq!(prompter.secret_prompts.len(), 1);
        assert!(store.get(DEFAULT_REPO_KEY).unwrap().encrypted);
    }
}
