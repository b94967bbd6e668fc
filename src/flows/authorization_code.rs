use std::time::Duration;

use tracing::{debug, info, warn};

use super::state::StateToken;
use crate::error::{GrantError, Result, StateViolation};
use crate::grant::{store_tokens_in, AccessToken, GrantExchanger, GrantType};
use crate::scope::ScopeSet;

pub const AUTHORIZE_PATH: &str = "/v2/authorize";
/// Storage key prefix for the per-session CSRF nonce.
pub const STATE_KEY_PREFIX: &str = "oauth_state_";
/// How long a started login may wait for its callback.
pub const STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Result of a completed authorization-code flow.
#[derive(Debug, Clone)]
pub struct AuthorizationOutcome {
    pub token: AccessToken,
    /// Application data sealed into the state at `start`.
    pub state_payload: Vec<u8>,
}

/// Authorization-code grant: `Idle -> AwaitingCallback -> Completed`.
///
/// The flow itself is stateless; the pending nonce lives in plain storage
/// under `oauth_state_{session}` between [`start`](Self::start) and
/// [`complete`](Self::complete), which may run in different requests.
///
/// # Example
/// ```no_run
/// # async fn run(exchanger: grantline::grant::GrantExchanger) -> grantline::error::Result<()> {
/// use grantline::flows::AuthorizationCodeFlow;
///
/// let flow = AuthorizationCodeFlow::new(exchanger, "session-1")
///     .with_state_payload("/listen");
/// let redirect = flow.start(&["identity.readonly"])?;
/// // ... user signs in, server calls back with ?code=..&state=..
/// let token = flow.complete("code-from-callback", "state-from-callback").await?;
/// # Ok(())
/// # }
/// ```
pub struct AuthorizationCodeFlow {
    exchanger: GrantExchanger,
    session: String,
    state_payload: Vec<u8>,
}

impl AuthorizationCodeFlow {
    pub fn new(exchanger: GrantExchanger, session: impl Into<String>) -> Self {
        Self {
            exchanger,
            session: session.into(),
            state_payload: Vec::new(),
        }
    }

    /// Application data carried encrypted through the state parameter.
    pub fn with_state_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.state_payload = payload.into();
        self
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn state_key(&self) -> String {
        format!("{STATE_KEY_PREFIX}{}", self.session)
    }

    /// The configured callback URL.
    pub fn redirect_uri(&self) -> Result<String> {
        let providers = self.exchanger.ensure_providers()?;
        Ok(providers.credentials.redirect_uri)
    }

    /// Build the authorize redirect and remember its nonce.
    ///
    /// A second `start` for the same session replaces the nonce, so an
    /// earlier redirect can no longer complete.
    pub fn start<S: AsRef<str>>(&self, scopes: &[S]) -> Result<String> {
        let providers = self.exchanger.ensure_providers()?;
        let scopes = ScopeSet::new(scopes)?;
        let encryption = providers.require_encryption()?;

        let state = StateToken::seal(&self.state_payload, encryption)?;
        providers
            .storage
            .set(&self.state_key(), state.nonce(), Some(STATE_TTL))?;

        let credentials = &providers.credentials;
        let scope = scopes.joined();
        let state = state.to_string();
        let params = [
            ("client_id", credentials.client_id.as_str()),
            ("redirect_uri", credentials.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("state", state.as_str()),
        ];
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        debug!(session = %self.session, scopes = %scopes, "authorization started");
        Ok(format!(
            "{}{AUTHORIZE_PATH}?{query}",
            providers.config.authorization_host()
        ))
    }

    /// Verify the callback state, exchange the code, and store the tokens.
    pub async fn complete(&self, code: &str, returned_state: &str) -> Result<AccessToken> {
        self.complete_with_payload(code, returned_state)
            .await
            .map(|outcome| outcome.token)
    }

    /// Like [`complete`](Self::complete), also returning the decrypted state payload.
    pub async fn complete_with_payload(
        &self,
        code: &str,
        returned_state: &str,
    ) -> Result<AuthorizationOutcome> {
        let providers = self.exchanger.ensure_providers()?;
        if code.trim().is_empty() {
            return Err(GrantError::InvalidArgument(
                "authorization code is required".to_string(),
            ));
        }
        if returned_state.trim().is_empty() {
            return Err(GrantError::InvalidArgument("state is required".to_string()));
        }
        let encryption = providers.require_encryption()?;

        let state = match StateToken::parse(returned_state) {
            Ok(state) => state,
            Err(err) => {
                warn!(session = %self.session, "callback state has no colon separator");
                return Err(err);
            }
        };

        let key = self.state_key();
        if providers.storage.get(&key)?.is_none() {
            warn!(session = %self.session, "no stored nonce for callback");
            return Err(GrantError::StateIntegrity(StateViolation::NoStoredNonce));
        }
        if !providers.storage.compare(&key, state.nonce())? {
            warn!(session = %self.session, "callback nonce does not match stored nonce");
            return Err(GrantError::StateIntegrity(StateViolation::NonceMismatch));
        }
        let state_payload = state.open(encryption)?;

        let token = self
            .exchanger
            .exchange_with(
                &providers,
                GrantType::AuthorizationCode,
                &[
                    ("code", code),
                    ("redirect_uri", providers.credentials.redirect_uri.as_str()),
                ],
            )
            .await?;

        store_tokens_in(providers.secure_storage, &token)?;
        providers.storage.remove(&key)?;
        info!(session = %self.session, "authorization code exchanged");

        Ok(AuthorizationOutcome {
            token,
            state_payload,
        })
    }
}
