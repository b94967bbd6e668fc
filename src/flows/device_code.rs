use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GrantError, Result};
use crate::grant::{store_tokens_in, AccessToken, ErrorBody, GrantExchanger, GrantType};
use crate::scope::ScopeSet;

pub const DEVICE_PATH: &str = "/authorization/v2/device";
/// Secure-storage key of the pending device code.
pub const DEVICE_CODE_KEY: &str = "device_code";
/// RFC 8628 default when the server omits `interval`.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Response of the device authorization endpoint.
///
/// # Example
/// ```
/// use grantline::flows::DeviceCode;
///
/// let code = DeviceCode {
///     device_code: "dc-123".to_string(),
///     user_code: "ABCD-EFGH".to_string(),
///     verification_uri: "https://www.npr.org/device".to_string(),
///     expires_in: 1800,
///     interval: 5,
/// };
/// assert_eq!(code.poll_interval().as_secs(), 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
}

impl DeviceCode {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.expires_in)
    }

    fn from_response_body(body: &str) -> Result<Self> {
        let code: Self = serde_json::from_str(body).map_err(|err| {
            GrantError::MalformedResponse(format!("invalid device code response: {err}"))
        })?;
        if code.device_code.is_empty() || code.user_code.is_empty() {
            return Err(GrantError::MalformedResponse(
                "device code response has an empty device_code or user_code".to_string(),
            ));
        }
        Ok(code)
    }
}

fn default_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

/// Device-code grant: `Idle -> Polling`.
///
/// Each [`poll`](Self::poll) is a single attempt. Callers loop on
/// [`GrantError::is_pending`], sleeping [`DeviceCode::poll_interval`] between
/// attempts, and stop calling to cancel.
pub struct DeviceCodeFlow {
    exchanger: GrantExchanger,
}

impl DeviceCodeFlow {
    pub fn new(exchanger: GrantExchanger) -> Self {
        Self { exchanger }
    }

    /// Request a device code and keep it in secure storage until it expires.
    pub async fn start<S: AsRef<str>>(&self, scopes: &[S]) -> Result<DeviceCode> {
        let providers = self.exchanger.ensure_providers()?;
        let scopes = ScopeSet::new(scopes)?;

        let credentials = &providers.credentials;
        let form = vec![
            ("client_id".to_string(), credentials.client_id.clone()),
            ("client_secret".to_string(), credentials.client_secret.clone()),
            ("scope".to_string(), scopes.joined()),
        ];
        let url = format!("{}{DEVICE_PATH}", providers.config.api_host());
        debug!(%url, scopes = %scopes, "requesting device code");

        let response = self.exchanger.post_form(&providers, &url, &form).await?;
        if response.is_error() {
            let message = ErrorBody::parse(&response.body).message(response.status);
            return Err(GrantError::device_code_request(response.status, message));
        }
        let code = DeviceCode::from_response_body(&response.body)?;

        providers
            .secure_storage
            .set(DEVICE_CODE_KEY, &code.device_code, Some(code.lifetime()))?;
        info!(
            expires_in = code.expires_in,
            interval = code.interval,
            "device code issued"
        );
        Ok(code)
    }

    /// One token-endpoint attempt with the stored device code.
    ///
    /// Fails with [`GrantError::AuthorizationPending`] (or
    /// [`GrantError::SlowDown`]) until the user finishes signing in.
    pub async fn poll(&self) -> Result<AccessToken> {
        let providers = self.exchanger.ensure_providers()?;
        let device_code = providers
            .secure_storage
            .get(DEVICE_CODE_KEY)?
            .ok_or_else(|| GrantError::NotFound("no device code on record".to_string()))?;

        let token = self
            .exchanger
            .exchange_with(
                &providers,
                GrantType::DeviceCode,
                &[("code", device_code.as_str())],
            )
            .await?;

        store_tokens_in(providers.secure_storage, &token)?;
        info!("device code authorized");
        Ok(token)
    }

    /// Forget the stored device code.
    pub fn clear(&self) -> Result<()> {
        let providers = self.exchanger.ensure_providers()?;
        providers.secure_storage.remove(DEVICE_CODE_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_defaults_when_missing() {
        let code = DeviceCode::from_response_body(
            r#"{"device_code":"d","user_code":"U","verification_uri":"https://v","expires_in":60}"#,
        )
        .unwrap();
        assert_eq!(code.interval, DEFAULT_POLL_INTERVAL_SECS);
        assert_eq!(code.lifetime(), Duration::from_secs(60));
    }

    #[test]
    fn missing_device_code_is_malformed() {
        let err = DeviceCode::from_response_body(
            r#"{"user_code":"U","verification_uri":"https://v","expires_in":60,"interval":5}"#,
        )
        .unwrap_err();
        assert!(matches!(err, GrantError::MalformedResponse(_)));
    }
}
