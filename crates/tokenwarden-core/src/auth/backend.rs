//! The seam between the session manager and the authentication backend.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::LoginCredentials;
use crate::api::ApiError;

/// A freshly issued access token, as returned by `/login` and `/refresh`.
#[derive(Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Token lifetime reported by the backend. `/refresh` usually omits it.
    #[serde(default, alias = "expires_in")]
    pub expires_in_seconds: Option<u64>,
}

impl TokenGrant {
    pub fn new(access_token: impl Into<String>, expires_in_seconds: Option<u64>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_in_seconds,
        }
    }

    pub fn lifetime(&self) -> Option<Duration> {
        self.expires_in_seconds.map(Duration::from_secs)
    }
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("expires_in_seconds", &self.expires_in_seconds)
            .finish()
    }
}

/// Authentication backend contract.
///
/// The long-lived renewal credential is never visible here: implementations
/// rely on the transport (an HTTP-only cookie) to attach it to `refresh`.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange credentials for an access token
    async fn login(&self, credentials: &LoginCredentials) -> Result<TokenGrant, ApiError>;

    /// Obtain a new access token using the renewal credential
    async fn refresh(&self) -> Result<TokenGrant, ApiError>;

    /// Invalidate the renewal credential server-side
    async fn logout(&self, access_token: Option<&str>) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_parses_optional_lifetime() {
        let grant: TokenGrant =
            serde_json::from_str(r#"{"access_token":"tok1","expires_in_seconds":900}"#)
                .expect("grant with lifetime");
        assert_eq!(grant.access_token, "tok1");
        assert_eq!(grant.lifetime(), Some(Duration::from_secs(900)));

        let grant: TokenGrant = serde_json::from_str(r#"{"access_token":"tok2","token_type":"bearer"}"#)
            .expect("grant without lifetime");
        assert_eq!(grant.lifetime(), None);

        let grant: TokenGrant = serde_json::from_str(r#"{"access_token":"tok3","expires_in":60}"#)
            .expect("grant with expires_in alias");
        assert_eq!(grant.expires_in_seconds, Some(60));
    }

    #[test]
    fn test_grant_debug_hides_token() {
        let grant = TokenGrant::new("secret-token", Some(900));
        let printed = format!("{:?}", grant);
        assert!(!printed.contains("secret-token"));
        assert!(printed.contains("900"));
    }
}
