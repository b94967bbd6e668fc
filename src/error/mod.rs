//! Error types for grantline.

use std::fmt;

use thiserror::Error;

/// Which state check rejected a callback.
///
/// `NoStoredNonce` and `NonceMismatch` are kept apart so callers can tell an
/// expired or foreign session from a forged one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateViolation {
    /// The returned state has no `nonce:payload` colon split.
    MissingSeparator,
    /// Nothing is stored for this session (expired, never started, or consumed).
    NoStoredNonce,
    /// A nonce is stored but the returned one does not match it.
    NonceMismatch,
}

impl fmt::Display for StateViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MissingSeparator => "colon separator missing",
            Self::NoStoredNonce => "invalid state, no nonce on record for this session",
            Self::NonceMismatch => "server state mismatch",
        };
        f.write_str(text)
    }
}

/// Primary error type for all grant-flow operations.
#[derive(Error, Debug)]
pub enum GrantError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Security configuration error: {0}")]
    SecurityConfiguration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state returned from OAuth server, {0}")]
    StateIntegrity(StateViolation),

    #[error("Token exchange failed (status {status}): {message}")]
    TokenExchange { status: u16, message: String },

    #[error("Device code request failed (status {status}): {message}")]
    DeviceCodeRequest { status: u16, message: String },

    #[error("Authorization pending")]
    AuthorizationPending,

    #[error("Authorization pending, polling too fast")]
    SlowDown,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or unsafe collaborators. Fix the setup; never retry.
    Setup,
    /// The caller passed bad input.
    Caller,
    /// CSRF or tamper condition on the state parameter.
    Integrity,
    /// The authorization server rejected the request.
    Remote,
    /// Device authorization not finished yet; poll again after `interval`.
    Pending,
    /// Corrupt response or ciphertext.
    Protocol,
    /// Nothing on record.
    Missing,
    Network,
    Storage,
}

impl GrantError {
    /// Build a `TokenExchange` error.
    pub fn token_exchange(status: u16, message: impl Into<String>) -> Self {
        Self::TokenExchange {
            status,
            message: message.into(),
        }
    }

    /// Build a `DeviceCodeRequest` error.
    pub fn device_code_request(status: u16, message: impl Into<String>) -> Self {
        Self::DeviceCodeRequest {
            status,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::SecurityConfiguration(_) => ErrorCategory::Setup,
            Self::InvalidArgument(_) => ErrorCategory::Caller,
            Self::StateIntegrity(_) => ErrorCategory::Integrity,
            Self::TokenExchange { .. } | Self::DeviceCodeRequest { .. } => ErrorCategory::Remote,
            Self::AuthorizationPending | Self::SlowDown => ErrorCategory::Pending,
            Self::MalformedResponse(_) | Self::Decryption(_) => ErrorCategory::Protocol,
            Self::NotFound(_) => ErrorCategory::Missing,
            Self::Network(_) | Self::Timeout(_) => ErrorCategory::Network,
            Self::Storage(_) => ErrorCategory::Storage,
        }
    }

    /// Whether a device-code poll should be repeated after the server interval.
    pub fn is_pending(&self) -> bool {
        self.category() == ErrorCategory::Pending
    }

    /// Whether the current flow must be abandoned.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self.category(),
            ErrorCategory::Pending | ErrorCategory::Network
        )
    }

    /// The state check that failed, if this is a state-integrity error.
    pub fn state_violation(&self) -> Option<StateViolation> {
        match self {
            Self::StateIntegrity(violation) => Some(*violation),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GrantError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::Network(format!("request timed out: {error}"));
        }
        Self::Network(error.to_string())
    }
}

impl From<std::io::Error> for GrantError {
    fn from(error: std::io::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for GrantError {
    fn from(error: serde_json::Error) -> Self {
        Self::MalformedResponse(error.to_string())
    }
}

impl From<toml::de::Error> for GrantError {
    fn from(error: toml::de::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<toml::ser::Error> for GrantError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, GrantError>;
