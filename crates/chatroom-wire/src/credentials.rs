//! The JSON credential payload carried by CREATE and JOIN requests

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::WireError;

/// `{"username": "...", "password": "..."}`, the body of a REQUEST frame
///
/// Kept as plain JSON (rather than a binary encoding) so unmodified clients
/// speaking the original text-based payload continue to interoperate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    /// Empty string means "no password"
    #[serde(default)]
    pub password: String,
}

/// Scrub the plaintext password from memory once the credential payload
/// goes out of scope.
impl Drop for Credentials {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

impl Credentials {
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let creds: Self = serde_json::from_slice(body)
            .map_err(|e| WireError::MalformedCredentials(e.to_string()))?;
        if creds.username.is_empty() {
            return Err(WireError::MalformedCredentials(
                "username must not be empty".to_string(),
            ));
        }
        Ok(creds)
    }

    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("Credentials serialization is infallible")
    }
}
