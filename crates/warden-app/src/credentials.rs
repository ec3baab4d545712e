//! Authenticated encryption of stored third-party API keys.
//!
//! Keys are AES-256-GCM keys derived as the SHA-256 digest of a process
//! secret. The stored form is URL-safe base64 (no padding) of
//! `nonce || ciphertext || tag` with a fresh 96-bit nonce per encryption.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Failures while sealing or opening a credential.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    /// Input is not base64 or too short to hold a nonce and tag
    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    /// Tag mismatch: wrong secret or tampered ciphertext
    #[error("credential authentication failed")]
    Authentication,

    /// Decrypted bytes are not UTF-8
    #[error("decrypted credential is not valid UTF-8")]
    Encoding,

    /// Cipher refused to encrypt
    #[error("credential encryption failed")]
    Encryption,
}

/// 256-bit key derived from a process secret. Never persisted.
#[derive(Clone)]
pub struct CredentialKey([u8; 32]);

impl fmt::Debug for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialKey(<redacted>)")
    }
}

/// Derive the AES-256 key for `secret`.
#[must_use]
pub fn derive_key(secret: &str) -> CredentialKey {
    CredentialKey(Sha256::digest(secret.as_bytes()).into())
}

/// Encrypt `plaintext` with a key derived from `secret`.
///
/// # Errors
/// Returns [`CredentialError::Encryption`] if the cipher fails.
pub fn encrypt(plaintext: &str, secret: &str) -> Result<String, CredentialError> {
    CredentialCipher::new(secret).encrypt(plaintext)
}

/// Decrypt a value produced by [`encrypt`] with the same `secret`.
///
/// # Errors
/// Returns [`CredentialError::Authentication`] for a wrong secret or tampered
/// input, and [`CredentialError::Malformed`] for input that is not a ciphertext.
pub fn decrypt(ciphertext: &str, secret: &str) -> Result<String, CredentialError> {
    CredentialCipher::new(secret).decrypt(ciphertext)
}

/// Cipher bound to one derived key, reusable across calls.
#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialCipher(<redacted>)")
    }
}

impl CredentialCipher {
    /// Derive the key from `secret` once.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self::from_key(&derive_key(secret))
    }

    /// Build a cipher from an already derived key.
    #[must_use]
    pub fn from_key(key: &CredentialKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(GenericArray::from_slice(&key.0)),
        }
    }

    /// Seal `plaintext` under a fresh random nonce.
    ///
    /// # Errors
    /// Returns [`CredentialError::Encryption`] if the cipher fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CredentialError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CredentialError::Encryption)?;

        let mut stored = Vec::with_capacity(NONCE_LEN + sealed.len());
        stored.extend_from_slice(&nonce);
        stored.extend_from_slice(&sealed);
        Ok(URL_SAFE_NO_PAD.encode(stored))
    }

    /// Open a value produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    /// See [`decrypt`].
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CredentialError> {
        let stored = URL_SAFE_NO_PAD
            .decode(ciphertext.trim())
            .map_err(|e| CredentialError::Malformed(e.to_string()))?;
        if stored.len() < NONCE_LEN + TAG_LEN {
            return Err(CredentialError::Malformed(format!(
                "expected at least {} bytes, got {}",
                NONCE_LEN + TAG_LEN,
                stored.len()
            )));
        }

        let (nonce, sealed) = stored.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CredentialError::Authentication)?;
        String::from_utf8(plaintext).map_err(|_| CredentialError::Encoding)
    }
}

/// Encrypted provider API key as persisted by the business-data store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Provider the key belongs to, e.g. `openai`.
    pub provider: String,
    /// Output of [`CredentialCipher::encrypt`].
    pub ciphertext: String,
    /// Inactive credentials are kept but not used.
    pub is_active: bool,
}

impl StoredCredential {
    /// Encrypt `api_key` into an active credential for `provider`.
    ///
    /// # Errors
    /// Returns [`CredentialError::Encryption`] if the cipher fails.
    pub fn seal(
        provider: impl Into<String>,
        api_key: &str,
        cipher: &CredentialCipher,
    ) -> Result<Self, CredentialError> {
        Ok(Self {
            provider: provider.into(),
            ciphertext: cipher.encrypt(api_key)?,
            is_active: true,
        })
    }

    /// Decrypt the stored API key.
    ///
    /// # Errors
    /// See [`decrypt`].
    pub fn reveal(&self, cipher: &CredentialCipher) -> Result<String, CredentialError> {
        cipher.decrypt(&self.ciphertext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_and_wrong_secret() -> Result<(), CredentialError> {
        let sealed = encrypt("sk-live-123", "server-secret")?;
        assert_ne!(sealed, "sk-live-123");
        assert_eq!(decrypt(&sealed, "server-secret")?, "sk-live-123");
        assert_eq!(
            decrypt(&sealed, "other-secret"),
            Err(CredentialError::Authentication)
        );
        Ok(())
    }

    #[test]
    fn every_encryption_uses_a_fresh_nonce() -> Result<(), CredentialError> {
        let cipher = CredentialCipher::new("k");
        let first = cipher.encrypt("same")?;
        let second = cipher.encrypt("same")?;
        assert_ne!(first, second);
        assert_eq!(cipher.decrypt(&first)?, cipher.decrypt(&second)?);
        Ok(())
    }

    #[test]
    fn tampering_is_detected() -> Result<(), Box<dyn std::error::Error>> {
        let cipher = CredentialCipher::new("k");
        let mut raw = URL_SAFE_NO_PAD.decode(cipher.encrypt("payload")?)?;
        let Some(last) = raw.last_mut() else {
            panic!("ciphertext is never empty");
        };
        *last ^= 0x01;
        assert_eq!(
            cipher.decrypt(&URL_SAFE_NO_PAD.encode(raw)),
            Err(CredentialError::Authentication)
        );
        Ok(())
    }

    #[test]
    fn garbage_is_malformed() {
        let cipher = CredentialCipher::new("k");
        assert!(matches!(
            cipher.decrypt("not base64!"),
            Err(CredentialError::Malformed(_))
        ));
        assert!(matches!(
            cipher.decrypt(&URL_SAFE_NO_PAD.encode([0_u8; 10])),
            Err(CredentialError::Malformed(_))
        ));
    }

    #[test]
    fn empty_plaintext_round_trips() -> Result<(), CredentialError> {
        let cipher = CredentialCipher::new("k");
        assert_eq!(cipher.decrypt(&cipher.encrypt("")?)?, "");
        Ok(())
    }

    #[test]
    fn stored_credential_seals_and_reveals() -> Result<(), CredentialError> {
        let cipher = CredentialCipher::from_key(&derive_key("k"));
        let stored = StoredCredential::seal("openai", "sk-abc", &cipher)?;
        assert!(stored.is_active);
        assert_eq!(stored.provider, "openai");
        assert!(!stored.ciphertext.contains("sk-abc"));
        assert_eq!(stored.reveal(&cipher)?, "sk-abc");
        Ok(())
    }

    #[test]
    fn key_debug_is_redacted() {
        assert_eq!(format!("{:?}", derive_key("hunter2")), "CredentialKey(<redacted>)");
    }
}
