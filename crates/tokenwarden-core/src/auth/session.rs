use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::TokenGrant;

/// Upper bound on any token lifetime we accept.
/// Keeps expiry arithmetic in range when a backend reports something absurd.
const MAX_TOKEN_LIFETIME_SECS: u64 = 30 * 24 * 60 * 60;

/// The authenticated half of the session: an access token and its expiry.
///
/// Lives in memory only; nothing here is ever written to disk.
#[derive(Clone)]
pub(crate) struct Session {
    access_token: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Session {
    pub(crate) fn from_grant(grant: TokenGrant, default_lifetime: Duration) -> Self {
        let issued_at = Utc::now();
        let lifetime = grant.lifetime().unwrap_or(default_lifetime);
        Self {
            access_token: grant.access_token,
            issued_at,
            expires_at: expiry_from(issued_at, lifetime),
        }
    }

    /// Swap in a renewed token. The session keeps its identity.
    pub(crate) fn replace_token(&mut self, grant: TokenGrant, default_lifetime: Duration) {
        let lifetime = grant.lifetime().unwrap_or(default_lifetime);
        self.issued_at = Utc::now();
        self.expires_at = expiry_from(self.issued_at, lifetime);
        self.access_token = grant.access_token;
    }

    pub fn token(&self) -> &str {
        &self.access_token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Lifetime of the current token as issued
    pub fn lifetime(&self) -> Duration {
        (self.expires_at - self.issued_at).to_std().unwrap_or_default()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn expiry_from(issued_at: DateTime<Utc>, lifetime: Duration) -> DateTime<Utc> {
    let capped = lifetime.min(Duration::from_secs(MAX_TOKEN_LIFETIME_SECS));
    // In range after capping
    let delta = chrono::Duration::from_std(capped).unwrap_or_else(|_| chrono::Duration::zero());
    issued_at + delta
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_LIFETIME: Duration = Duration::from_secs(900);

    #[test]
    fn test_expiry_from_grant_lifetime() {
        let session = Session::from_grant(TokenGrant::new("tok1", Some(900)), Duration::from_secs(60));
        assert_eq!(session.token(), "tok1");
        assert_eq!(session.lifetime(), Duration::from_secs(900));
        assert!(!session.is_expired());
        assert!(!session.is_expired_at(Utc::now() + chrono::Duration::minutes(14)));
    }

    #[test]
    fn test_expiry_falls_back_to_default_lifetime() {
        let session = Session::from_grant(TokenGrant::new("tok1", None), DEFAULT_LIFETIME);
        assert_eq!(session.lifetime(), DEFAULT_LIFETIME);
    }

    #[test]
    fn test_zero_lifetime_is_expired() {
        let session = Session::from_grant(TokenGrant::new("tok1", Some(0)), DEFAULT_LIFETIME);
        assert!(session.is_expired());
        assert_eq!(session.lifetime(), Duration::ZERO);
    }

    #[test]
    fn test_expired_at_boundary() {
        let session = Session::from_grant(TokenGrant::new("tok1", Some(900)), DEFAULT_LIFETIME);
        let expiry = session.expires_at();
        assert!(!session.is_expired_at(expiry - chrono::Duration::seconds(1)));
        assert!(session.is_expired_at(expiry));
    }

    #[test]
    fn test_absurd_lifetime_is_capped() {
        let session = Session::from_grant(TokenGrant::new("tok1", Some(u64::MAX)), DEFAULT_LIFETIME);
        assert_eq!(session.lifetime(), Duration::from_secs(MAX_TOKEN_LIFETIME_SECS));
    }

    #[test]
    fn test_replace_token_resets_expiry() {
        let mut session = Session::from_grant(TokenGrant::new("tok1", Some(900)), DEFAULT_LIFETIME);
        session.replace_token(TokenGrant::new("tok2", None), Duration::from_secs(300));
        assert_eq!(session.token(), "tok2");
        assert_eq!(session.lifetime(), Duration::from_secs(300));
    }
}
