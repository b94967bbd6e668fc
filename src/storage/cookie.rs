//! Cookie-backed storage.
//!
//! The routing layer feeds request cookies in and serializes the recorded
//! [`SetCookie`] writes onto the response; the header wire format is its job.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;

use super::{Entry, StorageProvider};
use crate::crypto::EncryptionProvider;
use crate::error::{GrantError, Result};

/// A cookie write to be emitted on the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    /// `Some(ZERO)` deletes the cookie; `None` is a session cookie.
    pub max_age: Option<Duration>,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
}

#[derive(Debug, Default)]
struct Jar {
    values: HashMap<String, Entry>,
    pending: Vec<SetCookie>,
}

/// Client-visible cookie storage. Not confidential.
///
/// Suitable for CSRF nonces, never for tokens.
#[derive(Debug, Default)]
pub struct CookieStorage {
    domain: Option<String>,
    jar: Mutex<Jar>,
}

impl CookieStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the jar with the cookies sent on the incoming request.
    pub fn from_request_cookies<I, K, V>(cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = cookies
            .into_iter()
            .map(|(name, value)| {
                let value: String = value.into();
                (name.into(), Entry::new(&value, None))
            })
            .collect();
        Self {
            domain: None,
            jar: Mutex::new(Jar {
                values,
                pending: Vec::new(),
            }),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Drain the cookie writes accumulated since the last call.
    pub fn take_set_cookies(&self) -> Result<Vec<SetCookie>> {
        Ok(std::mem::take(&mut self.jar()?.pending))
    }

    fn jar(&self) -> Result<MutexGuard<'_, Jar>> {
        self.jar
            .lock()
            .map_err(|_| GrantError::Storage("cookie jar lock poisoned".to_string()))
    }

    fn record(&self, name: &str, value: &str, max_age: Option<Duration>) -> Result<()> {
        let mut jar = self.jar()?;
        jar.pending.retain(|cookie| cookie.name != name);
        jar.pending.push(SetCookie {
            name: name.to_string(),
            value: value.to_string(),
            max_age,
            domain: self.domain.clone(),
            secure: true,
            http_only: true,
        });
        if max_age == Some(Duration::ZERO) {
            jar.values.remove(name);
        } else {
            jar.values
                .insert(name.to_string(), Entry::new(value, max_age));
        }
        Ok(())
    }
}

impl StorageProvider for CookieStorage {
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.record(key, value, ttl)
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Utc::now();
        Ok(self
            .jar()?
            .values
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.record(key, "", Some(Duration::ZERO))
    }

    fn is_confidential(&self) -> bool {
        false
    }
}

/// Cookie storage whose values are sealed with an [`EncryptionProvider`].
///
/// The end user holds only ciphertext, so the store counts as confidential.
pub struct SecureCookieStorage {
    cookies: Arc<CookieStorage>,
    encryption: Arc<dyn EncryptionProvider>,
}

impl SecureCookieStorage {
    pub fn new(cookies: Arc<CookieStorage>, encryption: Arc<dyn EncryptionProvider>) -> Self {
        Self {
            cookies,
            encryption,
        }
    }

    /// The underlying jar, for draining `Set-Cookie` writes.
    pub fn cookies(&self) -> &Arc<CookieStorage> {
        &self.cookies
    }
}

impl StorageProvider for SecureCookieStorage {
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let sealed = self.encryption.encrypt(value.as_bytes())?;
        self.cookies.set(key, &URL_SAFE_NO_PAD.encode(sealed), ttl)
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let Some(encoded) = self.cookies.get(key)? else {
            return Ok(None);
        };
        let sealed = URL_SAFE_NO_PAD
            .decode(encoded.as_bytes())
            .map_err(|_| GrantError::Decryption(format!("cookie {key} is not valid base64")))?;
        let plain = self.encryption.decrypt(&sealed)?;
        String::from_utf8(plain)
            .map(Some)
            .map_err(|_| GrantError::Decryption(format!("cookie {key} is not valid UTF-8")))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.cookies.remove(key)
    }

    fn is_confidential(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::AesGcmEncryption;

    fn encryption() -> Arc<dyn EncryptionProvider> {
        Arc::new(AesGcmEncryption::new(b"secret", b"asYh&%D9ne!j8HKQ"))
    }

    #[test]
    fn request_cookies_are_readable() {
        let cookies = CookieStorage::from_request_cookies([("oauth_state_s1", "abc")]);
        assert_eq!(cookies.get("oauth_state_s1").unwrap().as_deref(), Some("abc"));
        assert!(cookies.take_set_cookies().unwrap().is_empty());
    }

    #[test]
    fn set_records_a_single_pending_write_per_name() {
        let cookies = CookieStorage::new().with_domain(".example.com");
        cookies.set("n", "one", None).unwrap();
        cookies.set("n", "two", Some(Duration::from_secs(600))).unwrap();

        let writes = cookies.take_set_cookies().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].value, "two");
        assert_eq!(writes[0].max_age, Some(Duration::from_secs(600)));
        assert_eq!(writes[0].domain.as_deref(), Some(".example.com"));
        assert!(cookies.take_set_cookies().unwrap().is_empty());
    }

    #[test]
    fn remove_emits_an_expiring_cookie() {
        let cookies = CookieStorage::from_request_cookies([("device_code", "dc")]);
        cookies.remove("device_code").unwrap();
        assert_eq!(cookies.get("device_code").unwrap(), None);
        let writes = cookies.take_set_cookies().unwrap();
        assert_eq!(writes[0].max_age, Some(Duration::ZERO));
    }

    #[test]
    fn poisoned_jar_reports_pending_writes_as_an_error() {
        let cookies = Arc::new(CookieStorage::new());
        cookies.set("oauth_state_s1", "nonce", None).unwrap();
        let poisoner = cookies.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.jar.lock().unwrap();
            panic!("poison the jar");
        })
        .join();

        assert!(matches!(
            cookies.take_set_cookies(),
            Err(GrantError::Storage(_))
        ));
    }

    #[test]
    fn plain_cookies_are_not_confidential() {
        assert!(!CookieStorage::new().is_confidential());
        let secure = SecureCookieStorage::new(Arc::new(CookieStorage::new()), encryption());
        assert!(secure.is_confidential());
    }

    #[test]
    fn secure_cookie_hides_plaintext_from_the_client() {
        let jar = Arc::new(CookieStorage::new());
        let secure = SecureCookieStorage::new(jar.clone(), encryption());
        secure.set("access_token", "T", None).unwrap();

        let raw = jar.get("access_token").unwrap().unwrap();
        assert_ne!(raw, "T");
        assert_eq!(secure.get("access_token").unwrap().as_deref(), Some("T"));
    }

    #[test]
    fn tampered_secure_cookie_fails_to_decrypt() {
        let jar = Arc::new(CookieStorage::from_request_cookies([(
            "access_token",
            "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
        )]));
        let secure = SecureCookieStorage::new(jar, encryption());
        assert!(matches!(
            secure.get("access_token"),
            Err(GrantError::Decryption(_))
        ));
    }
}
