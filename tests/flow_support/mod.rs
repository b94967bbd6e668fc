#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use grantline::config::ProxyConfig;
use grantline::crypto::{AesGcmEncryption, EncryptionProvider};
use grantline::error::{GrantError, Result};
use grantline::grant::GrantExchanger;
use grantline::storage::{MemoryStorage, StorageProvider};
use grantline::transport::{HttpResponse, HttpTransport};

pub const TEST_SALT: &str = "asYh&%D9ne!j8HKQ";

pub fn test_config(api_host: &str, authorization_host: &str) -> ProxyConfig {
    ProxyConfig::builder()
        .client_id("test-client")
        .client_secret("test-secret")
        .redirect_uri("https://app.example.com/oauth2/callback")
        .api_host(api_host)
        .authorization_host(authorization_host)
        .encryption_salt(TEST_SALT)
        .request_timeout_secs(5)
        .build()
}

pub fn test_encryption() -> AesGcmEncryption {
    AesGcmEncryption::new(b"test-secret", TEST_SALT.as_bytes())
}

/// Storage spy over an in-memory map, counting every call.
pub struct SpyStorage {
    inner: MemoryStorage,
    confidential: bool,
    always_mismatch: bool,
    calls: AtomicUsize,
}

impl SpyStorage {
    pub fn new() -> Self {
        Self {
            inner: MemoryStorage::new(),
            confidential: true,
            always_mismatch: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Looks like a client-readable cookie jar.
    pub fn client_visible() -> Self {
        Self {
            confidential: false,
            ..Self::new()
        }
    }

    /// `compare` answers false no matter what is stored.
    pub fn always_mismatch() -> Self {
        Self {
            always_mismatch: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peek(&self, key: &str) -> Option<String> {
        self.inner.get(key).expect("memory storage never fails")
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl StorageProvider for SpyStorage {
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.touch();
        self.inner.set(key, value, ttl)
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        self.touch();
        self.inner.get(key)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.touch();
        self.inner.remove(key)
    }

    fn compare(&self, key: &str, value: &str) -> Result<bool> {
        self.touch();
        if self.always_mismatch {
            return Ok(false);
        }
        self.inner.compare(key, value)
    }

    fn is_confidential(&self) -> bool {
        self.confidential
    }
}

/// Encryption provider that reports itself unusable.
pub struct InvalidEncryption;

impl EncryptionProvider for InvalidEncryption {
    fn is_valid(&self) -> bool {
        false
    }

    fn encrypt(&self, _plaintext: &[u8]) -> Result<Vec<u8>> {
        Err(GrantError::Configuration("invalid".to_string()))
    }

    fn decrypt(&self, _ciphertext: &[u8]) -> Result<Vec<u8>> {
        Err(GrantError::Decryption("invalid".to_string()))
    }
}

/// A recorded outbound request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub form: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Transport answering from a queue of canned responses.
#[derive(Default)]
pub struct RecordingTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: serde_json::Value) -> Self {
        self.responses
            .lock()
            .expect("transport lock poisoned")
            .push_back(HttpResponse::new(status, body.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("transport lock poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("transport lock poisoned").len()
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn post_form(
        &self,
        url: &str,
        _headers: &[(String, String)],
        form: &[(String, String)],
    ) -> Result<HttpResponse> {
        self.requests
            .lock()
            .expect("transport lock poisoned")
            .push(RecordedRequest {
                url: url.to_string(),
                form: form.to_vec(),
            });
        self.responses
            .lock()
            .expect("transport lock poisoned")
            .pop_front()
            .ok_or_else(|| GrantError::Network("no canned response left".to_string()))
    }
}

/// Collaborators for one test, kept so assertions can inspect them.
pub struct Harness {
    pub storage: Arc<SpyStorage>,
    pub secure_storage: Arc<SpyStorage>,
    pub transport: Arc<RecordingTransport>,
    pub exchanger: GrantExchanger,
}

impl Harness {
    pub fn new(transport: RecordingTransport) -> Self {
        Self::with_storage(transport, SpyStorage::new(), SpyStorage::new())
    }

    pub fn with_storage(
        transport: RecordingTransport,
        storage: SpyStorage,
        secure_storage: SpyStorage,
    ) -> Self {
        let storage = Arc::new(storage);
        let secure_storage = Arc::new(secure_storage);
        let transport = Arc::new(transport);
        let exchanger = GrantExchanger::new(transport.clone())
            .with_config(Arc::new(test_config(
                "https://api.test",
                "https://auth.test",
            )))
            .with_storage(storage.clone())
            .with_secure_storage(secure_storage.clone())
            .with_encryption(Arc::new(test_encryption()));
        Self {
            storage,
            secure_storage,
            transport,
            exchanger,
        }
    }
}

/// Decoded query parameter of an authorize redirect.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| {
            urlencoding::decode(value)
                .expect("query value is valid utf-8")
                .into_owned()
        })
    })
}

pub fn token_body() -> serde_json::Value {
    serde_json::json!({
        "access_token": "T",
        "token_type": "Bearer",
        "expires_in": 690448786,
        "refresh_token": "R"
    })
}
