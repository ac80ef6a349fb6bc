//! Repository configuration management
//!
//! Stores per-repository settings in `~/.gem/nexus` (YAML). Authorizations
//! live in the same file unless a separate secrets file is configured, and
//! may be sealed with a master password (see [`crate::cipher`]).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cipher::SecretCipher;
use crate::error::{RepoError, Result};

/// Repository key used when none is given
pub const DEFAULT_REPO_KEY: &str = "default";

/// TLS certificate verification mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslVerifyMode {
    /// Verify the server certificate and host name
    #[default]
    Peer,
    /// Accept any certificate
    None,
}

/// Snapshot of one repository slot as seen through a [`ConfigStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Repository URL, without trailing slash
    pub url: Option<String>,
    /// Name of the configuration slot
    pub repo_key: String,
    /// Stored `Authorization` header value
    pub authorization: Option<String>,
    /// Prompt for credentials on every run instead of storing them
    pub always_prompt: bool,
    /// Stored credentials are sealed with a master password
    pub encrypted: bool,
    /// Stored TLS verification mode
    pub ssl_verify_mode: Option<SslVerifyMode>,
}

/// Durable key/value store of per-repository settings
pub trait ConfigStore {
    /// Read the settings for `repo_key`. While encrypted credentials are
    /// locked, `authorization` reads as `None`.
    fn get(&self, repo_key: &str) -> Result<RepositoryConfig>;

    /// Store the repository URL
    fn set_url(&mut self, repo_key: &str, url: &str) -> Result<()>;

    /// Store or remove (`None`) the authorization for `repo_key`
    fn set_authorization(&mut self, repo_key: &str, authorization: Option<&str>) -> Result<()>;

    /// Remove the stored authorizations of every repository
    fn clear_credentials(&mut self) -> Result<()>;

    /// Remove the stored authorization of one repository
    fn clear_authorization(&mut self, repo_key: &str) -> Result<()>;

    /// Switch always-prompt mode. Enabling it deletes all stored credentials.
    fn set_always_prompt(&mut self, enabled: bool) -> Result<()>;

    /// Provide the master password for encrypted credentials
    fn unlock(&mut self, password: &str) -> Result<()>;

    /// Seal stored credentials with the unlocked master password
    fn encrypt(&mut self) -> Result<()>;

    /// Store credentials in plain text again
    fn decrypt(&mut self) -> Result<()>;

    /// Move credentials to a separate secrets file, or back into the
    /// configuration file when `None`
    fn relocate_secrets(&mut self, secrets: Option<&Path>) -> Result<()>;

    /// All configured repositories with their URLs
    fn repos(&self) -> BTreeMap<String, Option<String>>;

    /// Where the settings are persisted
    fn location(&self) -> &Path;
}

/// Strip exactly one trailing slash
pub fn normalize_url(url: &str) -> String {
    url.strip_suffix('/').unwrap_or(url).to_string()
}

// ============ On-disk format ============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    always_prompt: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    secrets: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    encryption: Option<EncryptionInfo>,

    #[serde(default)]
    repos: BTreeMap<String, RepoEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EncryptionInfo {
    salt: String,
    check: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RepoEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    authorization: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    ssl_verify_mode: Option<SslVerifyMode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SecretsFile {
    #[serde(default)]
    authorizations: BTreeMap<String, String>,
}

/// [`ConfigStore`] backed by a YAML file and an optional secrets file
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    file: ConfigFile,
    secrets: SecretsFile,
    /// Salt and cipher once a master password was provided
    unlocked: Option<(String, SecretCipher)>,
}

impl FileConfigStore {
    /// Open the store at `path`, or at the default location
    pub fn open(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load_from(&Self::default_path()?),
        }
    }

    /// Load the store from a specific path. A missing file is an empty store.
    pub fn load_from(path: &Path) -> Result<Self> {
        let file: ConfigFile = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_yaml::from_str::<Option<ConfigFile>>(&content)?.unwrap_or_default()
        } else {
            ConfigFile::default()
        };

        let secrets = match &file.secrets {
            Some(secrets_path) if secrets_path.exists() => {
                let content = std::fs::read_to_string(secrets_path)?;
                serde_yaml::from_str::<Option<SecretsFile>>(&content)?.unwrap_or_default()
            }
            _ => SecretsFile::default(),
        };

        tracing::debug!("Loaded configuration from {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            file,
            secrets,
            unlocked: None,
        })
    }

    /// Get default configuration path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| RepoError::Configuration {
            message: "Could not determine home directory".to_string(),
        })?;
        Ok(home.join(".gem").join("nexus"))
    }

    /// Persist the configuration file and, if configured, the secrets file
    pub fn save(&self) -> Result<()> {
        write_private(&self.path, &serde_yaml::to_string(&self.file)?)?;
        if let Some(secrets_path) = &self.file.secrets {
            write_private(secrets_path, &serde_yaml::to_string(&self.secrets)?)?;
        }
        Ok(())
    }

    fn cipher(&self) -> Result<&SecretCipher> {
        self.unlocked
            .as_ref()
            .map(|(_, cipher)| cipher)
            .ok_or(RepoError::Locked)
    }

    /// Raw (possibly sealed) authorization as stored
    fn stored_authorization(&self, repo_key: &str) -> Option<&String> {
        if self.file.secrets.is_some() {
            self.secrets.authorizations.get(repo_key)
        } else {
            self.file
                .repos
                .get(repo_key)
                .and_then(|entry| entry.authorization.as_ref())
        }
    }

    fn put_stored_authorization(&mut self, repo_key: &str, value: Option<String>) {
        if self.file.secrets.is_some() {
            match value {
                Some(value) => {
                    self.secrets.authorizations.insert(repo_key.to_string(), value);
                }
                None => {
                    self.secrets.authorizations.remove(repo_key);
                }
            }
        } else {
            let entry = self.file.repos.entry(repo_key.to_string()).or_default();
            entry.authorization = value;
        }
    }

    /// Every stored (possibly sealed) authorization, removed from wherever
    /// it currently lives
    fn take_authorizations(&mut self) -> BTreeMap<String, String> {
        let mut taken = std::mem::take(&mut self.secrets.authorizations);
        for (key, entry) in self.file.repos.iter_mut() {
            if let Some(auth) = entry.authorization.take() {
                taken.insert(key.clone(), auth);
            }
        }
        taken
    }

    /// Re-seal every stored authorization with `f`
    ///
    /// Nothing is replaced unless `f` succeeds for every value.
    fn map_authorizations<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<String>,
    {
        let stored = self.secrets.authorizations.iter().chain(
            self.file
                .repos
                .iter()
                .filter_map(|(key, entry)| Some((key, entry.authorization.as_ref()?))),
        );
        let mapped = stored
            .map(|(key, value)| -> Result<(String, String)> { Ok((key.clone(), f(value)?)) })
            .collect::<Result<BTreeMap<_, _>>>()?;

        self.take_authorizations();
        for (key, value) in mapped {
            self.put_stored_authorization(&key, Some(value));
        }
        Ok(())
    }

    /// Set the stored TLS verification mode for a repository
    pub fn set_ssl_verify_mode(
        &mut self,
        repo_key: &str,
        mode: Option<SslVerifyMode>,
    ) -> Result<()> {
        self.file
            .repos
            .entry(repo_key.to_string())
            .or_default()
            .ssl_verify_mode = mode;
        self.save()
    }
}

impl ConfigStore for FileConfigStore {
    fn get(&self, repo_key: &str) -> Result<RepositoryConfig> {
        let entry = self.file.repos.get(repo_key);
        let encrypted = self.file.encryption.is_some();

        // Sealed values stay hidden until the store is unlocked
        let authorization = match (self.stored_authorization(repo_key), &self.unlocked) {
            (Some(stored), Some((_, cipher))) if encrypted => Some(cipher.decrypt(stored)?),
            (Some(_), None) if encrypted => None,
            (Some(stored), _) => Some(stored.clone()),
            (None, _) => None,
        };

        Ok(RepositoryConfig {
            url: entry.and_then(|e| e.url.as_deref()).map(normalize_url),
            repo_key: repo_key.to_string(),
            authorization,
            always_prompt: self.file.always_prompt,
            encrypted,
            ssl_verify_mode: entry.and_then(|e| e.ssl_verify_mode),
        })
    }

    fn set_url(&mut self, repo_key: &str, url: &str) -> Result<()> {
        self.file
            .repos
            .entry(repo_key.to_string())
            .or_default()
            .url = Some(url.to_string());
        self.save()
    }

    fn set_authorization(&mut self, repo_key: &str, authorization: Option<&str>) -> Result<()> {
        let value = match authorization {
            Some(auth) if self.file.encryption.is_some() => Some(self.cipher()?.encrypt(auth)?),
            Some(auth) => Some(auth.to_string()),
            None => None,
        };
        self.put_stored_authorization(repo_key, value);
        self.save()
    }

    fn clear_credentials(&mut self) -> Result<()> {
        self.take_authorizations();
        self.save()
    }

    fn clear_authorization(&mut self, repo_key: &str) -> Result<()> {
        self.set_authorization(repo_key, None)
    }

    fn set_always_prompt(&mut self, enabled: bool) -> Result<()> {
        self.file.always_prompt = enabled;
        if enabled {
            self.take_authorizations();
        }
        self.save()
    }

    fn unlock(&mut self, password: &str) -> Result<()> {
        let unlocked = match &self.file.encryption {
            Some(info) => {
                let cipher = SecretCipher::new(password, &info.salt)?;
                cipher.verify(&info.check)?;
                (info.salt.clone(), cipher)
            }
            None => {
                let salt = SecretCipher::generate_salt();
                let cipher = SecretCipher::new(password, &salt)?;
                (salt, cipher)
            }
        };
        self.unlocked = Some(unlocked);
        Ok(())
    }

    fn encrypt(&mut self) -> Result<()> {
        if self.file.encryption.is_some() {
            return Ok(());
        }
        let (salt, cipher) = self.unlocked.clone().ok_or(RepoError::Locked)?;
        self.map_authorizations(|plain| cipher.encrypt(plain))?;
        self.file.encryption = Some(EncryptionInfo {
            salt,
            check: cipher.check_token()?,
        });
        self.save()
    }

    fn decrypt(&mut self) -> Result<()> {
        if self.file.encryption.is_none() {
            return Ok(());
        }
        let cipher = self.cipher()?.clone();
        self.map_authorizations(|sealed| cipher.decrypt(sealed))?;
        self.file.encryption = None;
        self.save()
    }

    fn relocate_secrets(&mut self, secrets: Option<&Path>) -> Result<()> {
        let taken = self.take_authorizations();
        let previous = self.file.secrets.take();

        self.file.secrets = secrets.map(Path::to_path_buf);
        for (key, value) in taken {
            self.put_stored_authorization(&key, Some(value));
        }
        self.save()?;

        if let Some(previous) = previous {
            if Some(previous.as_path()) != secrets && previous.exists() {
                std::fs::remove_file(&previous)?;
                tracing::debug!("Removed secrets file {}", previous.display());
            }
        }
        Ok(())
    }

    fn repos(&self) -> BTreeMap<String, Option<String>> {
        self.file
            .repos
            .iter()
            .map(|(key, entry)| (key.clone(), entry.url.as_deref().map(normalize_url)))
            .collect()
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

/// Write `content` to `path`, readable by the owner only on Unix
fn write_private(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true).mode(0o600);
        std::io::Write::write_all(&mut options.open(path)?, content.as_bytes())?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        std::fs::write(path, content)?;
        Ok(())
    }
}
