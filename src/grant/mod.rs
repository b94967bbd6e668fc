//! Token-endpoint exchange shared by every grant.

pub mod token;

pub use token::AccessToken;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};
use tracing::{debug, info};

use crate::config::{ClientCredentials, ConfigProvider};
use crate::crypto::EncryptionProvider;
use crate::error::{GrantError, Result};
use crate::storage::StorageProvider;
use crate::transport::{HttpResponse, HttpTransport};

pub const TOKEN_PATH: &str = "/token";

/// Secure-storage key of the access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Secure-storage key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Refresh tokens outlive access tokens; ten years stands in for "no expiry".
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// `grant_type` values sent to the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    DeviceCode,
}

/// Collaborators that passed [`GrantExchanger::ensure_providers`].
pub struct Providers<'a> {
    pub config: &'a dyn ConfigProvider,
    pub storage: &'a dyn StorageProvider,
    pub secure_storage: &'a dyn StorageProvider,
    pub encryption: Option<&'a dyn EncryptionProvider>,
    pub credentials: ClientCredentials,
}

impl<'a> Providers<'a> {
    /// The encryption provider, required by flows that seal state.
    pub fn require_encryption(&self) -> Result<&'a dyn EncryptionProvider> {
        self.encryption.ok_or_else(|| {
            GrantError::Configuration(
                "EncryptionProvider must be set. See GrantExchanger::with_encryption".to_string(),
            )
        })
    }
}

/// Performs token-endpoint exchanges and owns the flow collaborators.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use grantline::config::ProxyConfig;
/// use grantline::grant::GrantExchanger;
/// use grantline::storage::{FileStorage, MemoryStorage};
/// use grantline::transport::ReqwestTransport;
///
/// let config = ProxyConfig::from_env()?;
/// let transport = ReqwestTransport::new(std::time::Duration::from_secs(30))?;
/// let exchanger = GrantExchanger::new(Arc::new(transport))
///     .with_config(Arc::new(config))
///     .with_storage(Arc::new(MemoryStorage::new()))
///     .with_secure_storage(Arc::new(FileStorage::new_default()));
/// # Ok::<(), grantline::error::GrantError>(())
/// ```
#[derive(Clone)]
pub struct GrantExchanger {
    config: Option<Arc<dyn ConfigProvider>>,
    storage: Option<Arc<dyn StorageProvider>>,
    secure_storage: Option<Arc<dyn StorageProvider>>,
    encryption: Option<Arc<dyn EncryptionProvider>>,
    transport: Arc<dyn HttpTransport>,
}

impl GrantExchanger {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config: None,
            storage: None,
            secure_storage: None,
            encryption: None,
            transport,
        }
    }

    pub fn with_config(mut self, config: Arc<dyn ConfigProvider>) -> Self {
        self.config = Some(config);
        self
    }

    /// Storage for CSRF nonces. May be client-visible.
    pub fn with_storage(mut self, storage: Arc<dyn StorageProvider>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Storage for tokens and device codes. Must be confidential.
    pub fn with_secure_storage(mut self, storage: Arc<dyn StorageProvider>) -> Self {
        self.secure_storage = Some(storage);
        self
    }

    pub fn with_encryption(mut self, encryption: Arc<dyn EncryptionProvider>) -> Self {
        self.encryption = Some(encryption);
        self
    }

    /// Check the collaborator setup before any storage or network call.
    pub fn ensure_providers(&self) -> Result<Providers<'_>> {
        let config = self.config.as_deref().ok_or_else(|| {
            GrantError::Configuration(
                "ConfigProvider must be set. See GrantExchanger::with_config".to_string(),
            )
        })?;
        let storage = self.storage.as_deref().ok_or_else(|| {
            GrantError::Configuration(
                "StorageProvider must be set. See GrantExchanger::with_storage".to_string(),
            )
        })?;
        let secure_storage = self.secure_storage.as_deref().ok_or_else(|| {
            GrantError::Configuration(
                "SecureStorageProvider must be set. See GrantExchanger::with_secure_storage"
                    .to_string(),
            )
        })?;
        if !secure_storage.is_confidential() {
            return Err(GrantError::SecurityConfiguration(
                "secure storage is not confidential; tokens must never be stored in a \
                 client-readable cookie"
                    .to_string(),
            ));
        }
        let encryption = self.encryption.as_deref();
        if let Some(encryption) = encryption {
            if !encryption.is_valid() {
                return Err(GrantError::SecurityConfiguration(
                    "EncryptionProvider must be valid. See EncryptionProvider::is_valid"
                        .to_string(),
                ));
            }
        }
        let credentials = ClientCredentials::from_provider(config)?;
        Ok(Providers {
            config,
            storage,
            secure_storage,
            encryption,
            credentials,
        })
    }

    /// Exchange a grant for tokens. Does not persist them.
    pub async fn exchange(
        &self,
        grant_type: GrantType,
        extra_params: &[(&str, &str)],
    ) -> Result<AccessToken> {
        let providers = self.ensure_providers()?;
        self.exchange_with(&providers, grant_type, extra_params)
            .await
    }

    /// Persist the access token (and refresh token, if any) in secure storage.
    pub fn store_tokens(&self, token: &AccessToken) -> Result<()> {
        let providers = self.ensure_providers()?;
        store_tokens_in(providers.secure_storage, token)
    }

    pub(crate) async fn exchange_with(
        &self,
        providers: &Providers<'_>,
        grant_type: GrantType,
        extra_params: &[(&str, &str)],
    ) -> Result<AccessToken> {
        let credentials = &providers.credentials;
        let mut form = vec![
            ("grant_type".to_string(), grant_type.to_string()),
            ("client_id".to_string(), credentials.client_id.clone()),
            ("client_secret".to_string(), credentials.client_secret.clone()),
        ];
        form.extend(
            extra_params
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        );

        let url = format!("{}{TOKEN_PATH}", providers.config.api_host());
        debug!(%grant_type, %url, "requesting token");
        let response = self.post_form(providers, &url, &form).await?;

        if response.is_error() {
            return Err(token_failure(grant_type, &response));
        }
        if let Some(code) = error_code_without_token(&response.body) {
            // Some servers report device-flow progress with a 2xx status.
            debug!(%grant_type, error = %code, "token endpoint returned an error body");
            return Err(token_failure(grant_type, &response));
        }
        AccessToken::from_response_body(&response.body)
    }

    pub(crate) async fn post_form(
        &self,
        providers: &Providers<'_>,
        url: &str,
        form: &[(String, String)],
    ) -> Result<HttpResponse> {
        let headers = providers.config.extra_headers();
        self.transport.post_form(url, &headers, form).await
    }
}

pub(crate) fn store_tokens_in(storage: &dyn StorageProvider, token: &AccessToken) -> Result<()> {
    storage.set(
        ACCESS_TOKEN_KEY,
        &token.access_token,
        Some(token.expires_in_duration()),
    )?;
    if let Some(refresh_token) = &token.refresh_token {
        storage.set(REFRESH_TOKEN_KEY, refresh_token, Some(REFRESH_TOKEN_TTL))?;
    }
    info!(
        expires_in = token.expires_in,
        has_refresh_token = token.refresh_token.is_some(),
        "tokens stored"
    );
    Ok(())
}

/// Error fields of an OAuth error body.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct ErrorBody {
    pub error: Option<String>,
    pub description: Option<String>,
}

impl ErrorBody {
    /// Lenient parse; an empty or non-JSON body yields no fields.
    pub fn parse(body: &str) -> Self {
        let Ok(value) = serde_json::from_str::<Value>(body) else {
            return Self::default();
        };
        let text = |field: &str| {
            value
                .get(field)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        };
        Self {
            error: text("error"),
            description: text("error_description")
                .or_else(|| text("message"))
                .or_else(|| text("detail")),
        }
    }

    pub fn message(&self, status: u16) -> String {
        match (&self.error, &self.description) {
            (Some(error), Some(description)) => format!("{error}: {description}"),
            (Some(error), None) => error.clone(),
            (None, Some(description)) => description.clone(),
            (None, None) => format!("Unknown error from authorization server (status {status})"),
        }
    }
}

fn token_failure(grant_type: GrantType, response: &HttpResponse) -> GrantError {
    let body = ErrorBody::parse(&response.body);
    if grant_type == GrantType::DeviceCode {
        match body.error.as_deref() {
            Some("authorization_pending") | Some("pending") => {
                return GrantError::AuthorizationPending
            }
            Some("slow_down") => return GrantError::SlowDown,
            _ => {}
        }
    }
    GrantError::token_exchange(response.status, body.message(response.status))
}

fn error_code_without_token(body: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(body).ok()?;
    if value.get("access_token").is_some() {
        return None;
    }
    value.get("error")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_types_render_as_wire_values() {
        assert_eq!(GrantType::AuthorizationCode.to_string(), "authorization_code");
        assert_eq!(GrantType::DeviceCode.as_ref(), "device_code");
        assert_eq!(
            "device_code".parse::<GrantType>().unwrap(),
            GrantType::DeviceCode
        );
    }

    #[test]
    fn error_message_prefers_description() {
        let body = ErrorBody::parse(r#"{"error":"invalid_grant","error_description":"code used"}"#);
        assert_eq!(body.message(400), "invalid_grant: code used");

        let body = ErrorBody::parse(r#"{"message":"Bad client"}"#);
        assert_eq!(body.message(401), "Bad client");
    }

    #[test]
    fn unparsable_body_falls_back_to_generic_message() {
        assert_eq!(
            ErrorBody::parse("").message(500),
            "Unknown error from authorization server (status 500)"
        );
        assert_eq!(ErrorBody::parse("<html>oops</html>"), ErrorBody::default());
    }

    #[test]
    fn pending_codes_only_apply_to_device_grant() {
        let pending = HttpResponse::new(400, r#"{"error":"authorization_pending"}"#);
        assert!(matches!(
            token_failure(GrantType::DeviceCode, &pending),
            GrantError::AuthorizationPending
        ));
        assert!(matches!(
            token_failure(GrantType::AuthorizationCode, &pending),
            GrantError::TokenExchange { status: 400, .. }
        ));

        let slow = HttpResponse::new(400, r#"{"error":"slow_down"}"#);
        assert!(matches!(
            token_failure(GrantType::DeviceCode, &slow),
            GrantError::SlowDown
        ));
    }

    #[test]
    fn error_body_with_token_is_not_an_error() {
        assert_eq!(
            error_code_without_token(r#"{"error":"authorization_pending"}"#).as_deref(),
            Some("authorization_pending")
        );
        assert_eq!(
            error_code_without_token(r#"{"access_token":"T","error":"x"}"#),
            None
        );
        assert_eq!(error_code_without_token("not json"), None);
    }
}
