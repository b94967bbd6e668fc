//! CLI command handlers for the device and authorization-code flows.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::ProxyConfig;
use crate::crypto::AesGcmEncryption;
use crate::error::GrantError;
use crate::flows::device_code::DEVICE_CODE_KEY;
use crate::flows::{new_session_id, AuthorizationCodeFlow, DeviceCodeFlow};
use crate::grant::{GrantExchanger, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::storage::{FileStorage, FileStorageConfig, StorageProvider};
use crate::transport::ReqwestTransport;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Extra wait added for each `slow_down` answer.
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Where the CLI keeps its files.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub storage_dir: PathBuf,
    pub config_file: Option<PathBuf>,
}

impl CliContext {
    pub fn new(storage_dir: Option<PathBuf>, config_file: Option<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.unwrap_or_else(FileStorageConfig::default_dir),
            config_file,
        }
    }

    fn load_config(&self) -> Result<ProxyConfig, GrantError> {
        match &self.config_file {
            Some(path) => ProxyConfig::from_toml_file(path),
            None => ProxyConfig::from_env(),
        }
    }

    fn secure_storage(&self) -> FileStorage {
        FileStorage::new(FileStorageConfig::new(self.storage_dir.join("tokens")))
    }

    fn state_storage(&self) -> FileStorage {
        FileStorage::new(FileStorageConfig::new(self.storage_dir.join("state")))
    }

    /// Exchanger wired with file storage; `with_encryption` only for flows that seal state.
    fn exchanger(&self, with_encryption: bool) -> Result<GrantExchanger, GrantError> {
        let config = Arc::new(self.load_config()?);
        let transport = ReqwestTransport::from_config(config.as_ref())?;
        debug!(storage_dir = %self.storage_dir.display(), "building exchanger");

        let mut exchanger = GrantExchanger::new(Arc::new(transport))
            .with_storage(Arc::new(self.state_storage()))
            .with_secure_storage(Arc::new(self.secure_storage()));
        if with_encryption {
            let encryption = AesGcmEncryption::from_config(config.as_ref());
            exchanger = exchanger.with_encryption(Arc::new(encryption));
        }
        Ok(exchanger.with_config(config))
    }
}

/// Handle `grantline device --scope ...`.
pub async fn handle_device(ctx: &CliContext, scopes: &[String]) -> CliResult {
    let flow = DeviceCodeFlow::new(ctx.exchanger(false)?);
    let code = flow.start(scopes).await?;

    println!("Visit: {}", code.verification_uri);
    println!("Enter code: {}", code.user_code);
    println!("Waiting for authorization...");

    let deadline = tokio::time::Instant::now() + code.lifetime();
    let mut interval = code.poll_interval();
    loop {
        tokio::time::sleep(interval).await;
        if tokio::time::Instant::now() >= deadline {
            flow.clear()?;
            eprintln!("Device code expired, please try again");
            std::process::exit(1);
        }
        match flow.poll().await {
            Ok(token) => {
                flow.clear()?;
                println!(
                    "Login successful (access token expires in {}s)",
                    token.expires_in
                );
                return Ok(());
            }
            Err(GrantError::AuthorizationPending) => continue,
            Err(GrantError::SlowDown) => {
                interval += SLOW_DOWN_STEP;
                debug!(interval_secs = interval.as_secs(), "server asked to slow down");
                continue;
            }
            Err(err) => {
                flow.clear()?;
                return Err(err.into());
            }
        }
    }
}

/// The requested session, or a fresh one so concurrent logins never share a nonce.
pub fn resolve_session(session: Option<&str>) -> String {
    match session.map(str::trim) {
        Some(session) if !session.is_empty() => session.to_string(),
        _ => new_session_id(),
    }
}

/// Handle `grantline authorize --scope ...`.
pub fn handle_authorize(
    ctx: &CliContext,
    scopes: &[String],
    session: Option<&str>,
    payload: Option<&str>,
) -> CliResult {
    let session = resolve_session(session);
    let flow = AuthorizationCodeFlow::new(ctx.exchanger(true)?, session.as_str())
        .with_state_payload(payload.unwrap_or_default());
    let url = flow.start(scopes)?;

    println!("Visit: {url}");
    println!("Session: {session}");
    println!(
        "Then run `grantline callback --session {session} --code <code> --state <state>`."
    );
    Ok(())
}

/// Handle `grantline callback --code .. --state ..`.
pub async fn handle_callback(ctx: &CliContext, code: &str, state: &str, session: &str) -> CliResult {
    let flow = AuthorizationCodeFlow::new(ctx.exchanger(true)?, session);
    let outcome = flow.complete_with_payload(code, state).await?;

    println!(
        "Login successful (access token expires in {}s)",
        outcome.token.expires_in
    );
    if !outcome.state_payload.is_empty() {
        println!(
            "State payload: {}",
            String::from_utf8_lossy(&outcome.state_payload)
        );
    }
    Ok(())
}

/// Handle `grantline logout`.
pub fn handle_logout(ctx: &CliContext) -> CliResult {
    clear_tokens(&ctx.secure_storage())?;
    println!("Logged out");
    Ok(())
}

fn clear_tokens(storage: &dyn StorageProvider) -> Result<(), GrantError> {
    for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, DEVICE_CODE_KEY] {
        storage.remove(key)?;
    }
    Ok(())
}
