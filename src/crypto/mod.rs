//! Symmetric encryption, nonce generation, and constant-time comparison.

use std::fmt;
use std::num::NonZeroU32;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use subtle::ConstantTimeEq;

use crate::config::ConfigProvider;
use crate::error::{GrantError, Result};

const KEY_LEN: usize = 32;
const MIN_SALT_LEN: usize = 8;
const PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(100_000) {
    Some(iterations) => iterations,
    None => panic!("PBKDF2 iteration count must be non-zero"),
};

/// Symmetric encryption of opaque payloads.
pub trait EncryptionProvider: Send + Sync {
    /// Whether the provider holds usable key material.
    fn is_valid(&self) -> bool;

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Fails with [`GrantError::Decryption`] on tampered or foreign ciphertext.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// AES-256-GCM with a PBKDF2-HMAC-SHA256 derived key.
///
/// Ciphertext layout is `nonce (12 bytes) || sealed payload || tag`.
///
/// # Example
/// ```
/// use grantline::crypto::{AesGcmEncryption, EncryptionProvider};
///
/// let enc = AesGcmEncryption::new(b"client-secret", b"asYh&%D9ne!j8HKQ");
/// let sealed = enc.encrypt(b"/after-login")?;
/// assert_eq!(enc.decrypt(&sealed)?, b"/after-login");
/// # Ok::<(), grantline::error::GrantError>(())
/// ```
pub struct AesGcmEncryption {
    key: [u8; KEY_LEN],
    valid: bool,
    rng: SystemRandom,
}

impl AesGcmEncryption {
    pub fn new(secret: &[u8], salt: &[u8]) -> Self {
        let mut key = [0u8; KEY_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            PBKDF2_ITERATIONS,
            salt,
            secret,
            &mut key,
        );
        Self {
            key,
            valid: !secret.is_empty() && salt.len() >= MIN_SALT_LEN,
            rng: SystemRandom::new(),
        }
    }

    /// Key the cipher with the client secret and the configured salt.
    pub fn from_config(config: &dyn ConfigProvider) -> Self {
        Self::new(
            config.client_secret().as_bytes(),
            config.encryption_salt().as_bytes(),
        )
    }

    fn sealing_key(&self) -> Result<LessSafeKey> {
        let unbound = UnboundKey::new(&aead::AES_256_GCM, &self.key)
            .map_err(|_| GrantError::SecurityConfiguration("invalid AES key".to_string()))?;
        Ok(LessSafeKey::new(unbound))
    }
}

impl fmt::Debug for AesGcmEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmEncryption")
            .field("key", &"..")
            .field("valid", &self.valid)
            .finish()
    }
}

impl EncryptionProvider for AesGcmEncryption {
    fn is_valid(&self) -> bool {
        self.valid
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let key = self.sealing_key()?;
        let mut nonce_bytes = [0u8; aead::NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| GrantError::SecurityConfiguration("system RNG unavailable".to_string()))?;

        let mut in_out = plaintext.to_vec();
        key.seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| GrantError::SecurityConfiguration("encryption failed".to_string()))?;

        Ok([nonce_bytes.as_slice(), in_out.as_slice()].concat())
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < aead::NONCE_LEN + aead::AES_256_GCM.tag_len() {
            return Err(GrantError::Decryption("ciphertext too short".to_string()));
        }
        let key = self.sealing_key()?;
        let (nonce_bytes, sealed) = ciphertext.split_at(aead::NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| GrantError::Decryption("invalid nonce".to_string()))?;

        let mut in_out = sealed.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| GrantError::Decryption("ciphertext failed authentication".to_string()))?;
        Ok(plaintext.to_vec())
    }
}

/// Compare two byte strings without leaking the position of the first difference.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// 32 random bytes, base64url without padding.
pub fn random_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| GrantError::SecurityConfiguration("system RNG unavailable".to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
