//! Authentication support for the Workers KV SDK
//!
//! The KV REST API authenticates every request with an account email and a
//! global API key, sent as the `X-Auth-Email` and `X-Auth-Key` headers.
//!
//! # Example
//!
//! ```
//! use kv_storage_sdk::Credentials;
//!
//! let credentials = Credentials::new("ops@example.com", "global-api-key");
//! assert_eq!(credentials.auth_email(), "ops@example.com");
//!
//! // The key never shows up in debug output
//! assert!(!format!("{:?}", credentials).contains("global-api-key"));
//! ```

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Header carrying the account email
pub(crate) const AUTH_EMAIL_HEADER: &str = "x-auth-email";

/// Header carrying the API key
pub(crate) const AUTH_KEY_HEADER: &str = "x-auth-key";

/// Account credentials attached to every request
///
/// # Security
///
/// The API key is stored as a [`SecretString`] to prevent accidental
/// exposure in logs or debug output.
#[derive(Clone)]
pub struct Credentials {
    auth_email: String,
    auth_key: SecretString,
}

impl Credentials {
    /// Create credentials from an account email and API key
    pub fn new(auth_email: impl Into<String>, auth_key: impl Into<String>) -> Self {
        Self {
            auth_email: auth_email.into(),
            auth_key: SecretString::new(auth_key.into()),
        }
    }

    /// The account email sent as `X-Auth-Email`
    pub fn auth_email(&self) -> &str {
        &self.auth_email
    }

    /// Header name/value pairs to attach to a request, names in lowercase
    pub(crate) fn headers(&self) -> [(&'static str, String); 2] {
        [
            (AUTH_EMAIL_HEADER, self.auth_email.clone()),
            (AUTH_KEY_HEADER, self.auth_key.expose_secret().clone()),
        ]
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("auth_email", &self.auth_email)
            .field("auth_key", &"****")
            .finish()
    }
}
