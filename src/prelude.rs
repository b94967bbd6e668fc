//! Convenience re-exports for common use.

pub use crate::config::{ConfigProvider, ProxyConfig};
pub use crate::crypto::{AesGcmEncryption, EncryptionProvider};
pub use crate::error::{GrantError, Result};
pub use crate::flows::{AuthorizationCodeFlow, DeviceCode, DeviceCodeFlow};
pub use crate::grant::{AccessToken, GrantExchanger, GrantType};
pub use crate::scope::ScopeSet;
pub use crate::storage::{
    CookieStorage, FileStorage, MemoryStorage, SecureCookieStorage, StorageProvider,
};
pub use crate::transport::{HttpTransport, ReqwestTransport};
