//! The `nonce:payload` state parameter.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

use crate::crypto::{random_token, EncryptionProvider};
use crate::error::{GrantError, Result, StateViolation};

const SEPARATOR: char = ':';

/// State round-tripped through the authorization server.
///
/// `nonce` is checked against storage; `payload` is base64url ciphertext of
/// application data and therefore never contains the separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateToken {
    nonce: String,
    payload: String,
}

impl StateToken {
    /// Fresh nonce plus `payload` sealed with `encryption`.
    pub fn seal(payload: &[u8], encryption: &dyn EncryptionProvider) -> Result<Self> {
        let sealed = encryption.encrypt(payload)?;
        Ok(Self {
            nonce: random_token()?,
            payload: URL_SAFE_NO_PAD.encode(sealed),
        })
    }

    /// Split a returned state on its first colon.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.split_once(SEPARATOR) {
            Some((nonce, payload)) if !nonce.is_empty() && !payload.is_empty() => Ok(Self {
                nonce: nonce.to_string(),
                payload: payload.to_string(),
            }),
            _ => Err(GrantError::StateIntegrity(StateViolation::MissingSeparator)),
        }
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Decrypt the application payload.
    pub fn open(&self, encryption: &dyn EncryptionProvider) -> Result<Vec<u8>> {
        let sealed = URL_SAFE_NO_PAD
            .decode(self.payload.as_bytes())
            .map_err(|_| GrantError::Decryption("state payload is not valid base64".to_string()))?;
        encryption.decrypt(&sealed)
    }
}

impl fmt::Display for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.nonce, self.payload)
    }
}
