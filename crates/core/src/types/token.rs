//! Opaque access credentials.

use secrecy::{ExposeSecret, SecretString};

/// An opaque access credential issued by the session backend.
///
/// Wraps [`SecretString`] so the token is redacted from `Debug` output and
/// never logged by accident. The raw value is only reachable through
/// [`AccessToken::expose`], which call sites use at the request boundary.
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    /// Create a token from the raw credential string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Expose the raw credential for use in a request header.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AccessToken").field(&"[REDACTED]").finish()
    }
}

impl From<String> for AccessToken {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

impl From<&str> for AccessToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let token = AccessToken::new("tok_very_secret");
        let debug = format!("{token:?}");
        assert!(!debug.contains("tok_very_secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_expose_returns_raw_value() {
        let token = AccessToken::new("tok_abc");
        assert_eq!(token.expose(), "tok_abc");
    }
}
