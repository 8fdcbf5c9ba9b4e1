//! Bearer credential type.
//!
//! The cart never inspects a credential. It only needs to know whether one is
//! held and whether it is the same one it saw last time.

use secrecy::{ExposeSecret, SecretString};

/// Opaque bearer token issued by the authentication service.
///
/// Wraps a [`SecretString`] so the token is zeroized on drop and redacted
/// in `Debug` output.
#[derive(Clone)]
pub struct Credential(SecretString);

impl Credential {
    /// Wrap a raw bearer token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Expose the raw token for an `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.0.expose_secret() == other.0.expose_secret()
    }
}

impl Eq for Credential {}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

impl From<SecretString> for Credential {
    fn from(secret: SecretString) -> Self {
        Self(secret)
    }
}
