//! Grant flows driven against the authorization server.

pub mod authorization_code;
pub mod device_code;
pub mod state;

pub use authorization_code::{AuthorizationCodeFlow, AuthorizationOutcome};
pub use device_code::{DeviceCode, DeviceCodeFlow};
pub use state::StateToken;

/// A random identifier for keying a new login session.
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_fresh_uuids() {
        let first = new_session_id();
        let second = new_session_id();
        assert_ne!(first, second);
        assert_eq!(
            uuid::Uuid::parse_str(&first).unwrap().get_version_num(),
            4
        );
    }
}
