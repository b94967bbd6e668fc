use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GrantError, Result};

/// Token-endpoint success payload.
///
/// `refresh_token` is optional; servers omit it for some clients.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl AccessToken {
    /// Parse a 2xx token-endpoint body.
    ///
    /// Missing or mistyped `access_token`, `token_type`, or `expires_in`
    /// yields [`GrantError::MalformedResponse`].
    pub fn from_response_body(body: &str) -> Result<Self> {
        let token: Self = serde_json::from_str(body).map_err(|err| {
            GrantError::MalformedResponse(format!("invalid token response: {err}"))
        })?;
        if token.access_token.is_empty() {
            return Err(GrantError::MalformedResponse(
                "token response has an empty access_token".to_string(),
            ));
        }
        if token.token_type.is_empty() {
            return Err(GrantError::MalformedResponse(
                "token response has an empty token_type".to_string(),
            ));
        }
        Ok(token)
    }

    pub fn expires_in_duration(&self) -> Duration {
        Duration::from_secs(self.expires_in)
    }

    /// Value for an `Authorization` header, e.g. `Bearer abc`.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"..")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| ".."))
            .finish()
    }
}
