//! Encryption of stored secrets
//!
//! Secrets are sealed with AES-256-GCM. The key is SHA-256 over a random
//! per-file salt followed by the master password. Sealed values are stored
//! as `base64(nonce || ciphertext)`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use crate::error::{RepoError, Result};

const NONCE_LEN: usize = 12;
const SALT_LEN: usize = 16;

/// Plaintext of the check token written next to the salt
const CHECK_PLAINTEXT: &str = "nexpush";

/// Symmetric cipher bound to one master password and salt
#[derive(Clone)]
pub struct SecretCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretCipher(***)")
    }
}

impl SecretCipher {
    /// Derive the cipher for `password` and a base64 encoded `salt`
    pub fn new(password: &str, salt: &str) -> Result<Self> {
        let salt = STANDARD.decode(salt).map_err(|e| RepoError::Decryption {
            message: format!("invalid salt: {}", e),
        })?;

        let mut hasher = Sha256::new();
        hasher.update(&salt);
        hasher.update(password.as_bytes());
        let digest = hasher.finalize();

        let key = Key::<Aes256Gcm>::from_slice(digest.as_slice());
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Fresh random salt, base64 encoded
    pub fn generate_salt() -> String {
        let salt: [u8; SALT_LEN] = rand::random();
        STANDARD.encode(salt)
    }

    /// Seal `plaintext`
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce: [u8; NONCE_LEN] = rand::random();
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| RepoError::Decryption {
                message: format!("encryption failed: {}", e),
            })?;

        let mut out = nonce.to_vec();
        out.extend_from_slice(&sealed);
        Ok(STANDARD.encode(out))
    }

    /// Open a value produced by [`SecretCipher::encrypt`]
    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let raw = STANDARD.decode(encoded).map_err(|e| RepoError::Decryption {
            message: e.to_string(),
        })?;
        if raw.len() <= NONCE_LEN {
            return Err(RepoError::Decryption {
                message: "sealed value is truncated".to_string(),
            });
        }

        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| RepoError::Decryption {
                message: "wrong encryption password".to_string(),
            })?;

        String::from_utf8(plain).map_err(|e| RepoError::Decryption {
            message: e.to_string(),
        })
    }

    /// Token proving knowledge of the password, stored alongside the salt
    pub fn check_token(&self) -> Result<String> {
        self.encrypt(CHECK_PLAINTEXT)
    }

    /// Verify a token written by [`SecretCipher::check_token`]
    pub fn verify(&self, token: &str) -> Result<()> {
        match self.decrypt(token)?.as_str() {
            CHECK_PLAINTEXT => Ok(()),
            _ => Err(RepoError::Decryption {
                message: "wrong encryption password".to_string(),
            }),
        }
    }
}
