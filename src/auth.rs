use base64::display::Base64Display;
use serde::{Deserialize, Serialize};

#[derive(Clone, Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct BasicAuthSettings {
    pub user: String,
    pub password: String,
}

impl BasicAuthSettings {
    /// The token a client puts after `Basic ` in `Proxy-Authorization`.
    pub fn to_credential(&self) -> String {
        use base64::engine::general_purpose::STANDARD as B64;
        let credentials = format!("{}:{}", self.user, self.password);

        Base64Display::new(credentials.as_bytes(), &B64).to_string()
    }
}

/// Check a presented `Proxy-Authorization` value against the configured credential.
///
/// An empty `configured` credential disables authentication. Otherwise `presented` must be
/// exactly `<scheme> <token>` where the scheme is `Basic` in any case and the token equals
/// `configured` byte for byte.
pub fn authenticate(configured: &str, presented: &str) -> bool {
    if configured.is_empty() {
        return true;
    }

    let mut parts = presented.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) => {
            scheme.eq_ignore_ascii_case("Basic") && token == configured
        }
        _ => false,
    }
}
