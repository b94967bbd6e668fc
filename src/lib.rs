//! grantline: OAuth2 grant proxy
//!
//! Runs the OAuth2 authorization-code and device-code grants against an
//! authorization server on behalf of a client application. The client
//! secret stays server-side, tokens land in confidential storage, and the
//! `state` parameter carries a CSRF nonce plus an encrypted payload.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use grantline::prelude::*;
//!
//! # async fn example() -> grantline::error::Result<()> {
//! let config = Arc::new(ProxyConfig::from_env()?);
//! let exchanger = GrantExchanger::new(Arc::new(ReqwestTransport::from_config(config.as_ref())?))
//!     .with_encryption(Arc::new(AesGcmEncryption::from_config(config.as_ref())))
//!     .with_storage(Arc::new(MemoryStorage::new()))
//!     .with_secure_storage(Arc::new(FileStorage::new_default()))
//!     .with_config(config);
//!
//! let flow = DeviceCodeFlow::new(exchanger);
//! let code = flow.start(&["identity.readonly"]).await?;
//! println!("Visit {} and enter {}", code.verification_uri, code.user_code);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod flows;
pub mod grant;
pub mod prelude;
pub mod scope;
pub mod storage;
pub mod transport;

#[cfg(feature = "cli")]
pub mod cli;
