//! Configuration: the `ConfigProvider` seam and its default implementation.
//!
//! Resolution for [`ProxyConfig::from_env`]:
//! 1. Process environment (`GRANTLINE_*`)
//! 2. A `.env` file in the working directory, if present

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{GrantError, Result};

pub const DEFAULT_API_HOST: &str = "https://api.npr.org";
pub const DEFAULT_AUTHORIZATION_HOST: &str = "https://authorization.api.npr.org";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const ENV_CLIENT_ID: &str = "GRANTLINE_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "GRANTLINE_CLIENT_SECRET";
const ENV_API_HOST: &str = "GRANTLINE_API_HOST";
const ENV_AUTH_HOST: &str = "GRANTLINE_AUTH_HOST";
const ENV_REDIRECT_URI: &str = "GRANTLINE_REDIRECT_URI";
const ENV_ENCRYPTION_SALT: &str = "GRANTLINE_ENCRYPTION_SALT";
const ENV_REQUEST_TIMEOUT: &str = "GRANTLINE_REQUEST_TIMEOUT_SECS";

/// Source of client credentials and endpoint locations.
pub trait ConfigProvider: Send + Sync {
    fn client_id(&self) -> String;
    fn client_secret(&self) -> String;
    /// Base URL for `/token` and `/authorization/v2/device`.
    fn api_host(&self) -> String;
    /// Base URL for the `/v2/authorize` redirect.
    fn authorization_host(&self) -> String;
    /// Callback URL registered with the authorization server.
    fn redirect_uri(&self) -> String;
    fn encryption_salt(&self) -> String;

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    /// Headers attached to every outbound request.
    fn extra_headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Client identity used for every grant.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl ClientCredentials {
    /// Snapshot the credentials of a provider, rejecting empty values.
    pub fn from_provider(provider: &dyn ConfigProvider) -> Result<Self> {
        let credentials = Self {
            client_id: provider.client_id(),
            client_secret: provider.client_secret(),
            redirect_uri: provider.redirect_uri(),
        };
        credentials.validate()?;
        Ok(credentials)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("redirect_uri", &self.redirect_uri),
        ] {
            if value.trim().is_empty() {
                return Err(GrantError::Configuration(format!(
                    "{name} must not be empty"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"..")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Static configuration for a registered OAuth client.
///
/// # Example
/// ```
/// use grantline::config::{ConfigProvider, ProxyConfig};
///
/// let config = ProxyConfig::builder()
///     .client_id("my-client")
///     .client_secret("s3cret")
///     .redirect_uri("https://app.example.com/oauth2/callback")
///     .build();
/// assert_eq!(config.api_host(), "https://api.npr.org");
/// ```
#[derive(Clone, Builder, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[builder(into)]
    pub client_id: String,
    #[builder(into)]
    pub client_secret: String,
    #[builder(into)]
    pub redirect_uri: String,
    #[builder(into, default = DEFAULT_API_HOST.to_string())]
    #[serde(default = "default_api_host")]
    pub api_host: String,
    #[builder(into, default = DEFAULT_AUTHORIZATION_HOST.to_string())]
    #[serde(default = "default_authorization_host")]
    pub authorization_host: String,
    #[builder(into, default)]
    #[serde(default)]
    pub encryption_salt: String,
    #[builder(default = DEFAULT_REQUEST_TIMEOUT_SECS)]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[builder(default)]
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"..")
            .field("redirect_uri", &self.redirect_uri)
            .field("api_host", &self.api_host)
            .field("authorization_host", &self.authorization_host)
            .field("encryption_salt", &"..")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("extra_headers", &self.extra_headers)
            .finish()
    }
}

impl ProxyConfig {
    /// Load from `GRANTLINE_*` environment variables (and `.env`, if present).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let timeout = match std::env::var(ENV_REQUEST_TIMEOUT) {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|_| {
                GrantError::Configuration(format!(
                    "{ENV_REQUEST_TIMEOUT} must be a whole number of seconds, got {raw:?}"
                ))
            })?,
            Err(_) => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        Ok(Self {
            client_id: required_env(ENV_CLIENT_ID)?,
            client_secret: required_env(ENV_CLIENT_SECRET)?,
            redirect_uri: required_env(ENV_REDIRECT_URI)?,
            api_host: std::env::var(ENV_API_HOST).unwrap_or_else(|_| default_api_host()),
            authorization_host: std::env::var(ENV_AUTH_HOST)
                .unwrap_or_else(|_| default_authorization_host()),
            encryption_salt: std::env::var(ENV_ENCRYPTION_SALT).unwrap_or_default(),
            request_timeout_secs: timeout,
            extra_headers: BTreeMap::new(),
        })
    }

    /// Load from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            GrantError::Configuration(format!("Failed to read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw)
            .map_err(|err| GrantError::Configuration(format!("Invalid config file: {err}")))
    }

    pub fn credentials(&self) -> Result<ClientCredentials> {
        ClientCredentials::from_provider(self)
    }
}

impl ConfigProvider for ProxyConfig {
    fn client_id(&self) -> String {
        self.client_id.clone()
    }

    fn client_secret(&self) -> String {
        self.client_secret.clone()
    }

    fn api_host(&self) -> String {
        trim_host(&self.api_host)
    }

    fn authorization_host(&self) -> String {
        trim_host(&self.authorization_host)
    }

    fn redirect_uri(&self) -> String {
        self.redirect_uri.clone()
    }

    fn encryption_salt(&self) -> String {
        self.encryption_salt.clone()
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn extra_headers(&self) -> Vec<(String, String)> {
        self.extra_headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

fn required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(GrantError::Configuration(format!("{name} is not set"))),
    }
}

fn trim_host(host: &str) -> String {
    host.trim_end_matches('/').to_string()
}

fn default_api_host() -> String {
    DEFAULT_API_HOST.to_string()
}

fn default_authorization_host() -> String {
    DEFAULT_AUTHORIZATION_HOST.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProxyConfig {
        ProxyConfig::builder()
            .client_id("fake_client_id")
            .client_secret("fake_secret")
            .redirect_uri("https://one.example.com/oauth2/callback")
            .api_host("https://api.example.com/")
            .build()
    }

    #[test]
    fn hosts_are_returned_without_trailing_slash() {
        let config = config();
        assert_eq!(config.api_host(), "https://api.example.com");
        assert_eq!(config.authorization_host(), DEFAULT_AUTHORIZATION_HOST);
    }

    #[test]
    fn credentials_reject_empty_secret() {
        let mut config = config();
        config.client_secret = "  ".to_string();
        let err = config.credentials().unwrap_err();
        assert!(matches!(err, GrantError::Configuration(msg) if msg.contains("client_secret")));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let mut config = config();
        config.encryption_salt = "asYh&%D9ne!j8HKQ".to_string();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("fake_secret"));
        assert!(!rendered.contains("asYh"));
        assert!(rendered.contains("fake_client_id"));
    }

    #[test]
    fn toml_fills_in_defaults() {
        let config = ProxyConfig::from_toml_str(
            r#"
client_id = "id"
client_secret = "secret"
redirect_uri = "https://app.example.com/cb"

[extra_headers]
X-Latitude = "37.24"
"#,
        )
        .unwrap();
        assert_eq!(config.api_host, DEFAULT_API_HOST);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(
            config.extra_headers(),
            vec![("X-Latitude".to_string(), "37.24".to_string())]
        );
    }
}
