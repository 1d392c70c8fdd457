use std::fmt;

use serde::Serialize;

use super::AuthFailure;

/// Maximum length for the login identifier.
/// Identifiers are usernames or email addresses, 50 chars covers most.
pub const MAX_IDENTIFIER_LENGTH: usize = 50;

/// Maximum length for the secret.
/// 128 chars accommodates password managers and passphrases.
pub const MAX_SECRET_LENGTH: usize = 128;

/// Login form contents, serialized as the `/login` request body.
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
    pub identifier: String,
    pub secret: String,
}

impl LoginCredentials {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into().trim().to_string(),
            secret: secret.into(),
        }
    }

    /// Reject empty or oversized input before anything goes over the wire
    pub fn validate(&self) -> Result<(), AuthFailure> {
        if self.identifier.is_empty() || self.secret.is_empty() {
            return Err(AuthFailure::InvalidCredentials(
                "Username and password required".to_string(),
            ));
        }
        if self.identifier.chars().count() > MAX_IDENTIFIER_LENGTH {
            return Err(AuthFailure::InvalidCredentials(format!(
                "Username must be at most {} characters",
                MAX_IDENTIFIER_LENGTH
            )));
        }
        if self.secret.chars().count() > MAX_SECRET_LENGTH {
            return Err(AuthFailure::InvalidCredentials(format!(
                "Password must be at most {} characters",
                MAX_SECRET_LENGTH
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_both_fields() {
        assert!(LoginCredentials::new("alice", "p@ss").validate().is_ok());
        assert!(LoginCredentials::new("", "p@ss").validate().is_err());
        assert!(LoginCredentials::new("   ", "p@ss").validate().is_err());
        assert!(LoginCredentials::new("alice", "").validate().is_err());
    }

    #[test]
    fn test_validate_length_limits() {
        let long_name = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        assert!(LoginCredentials::new(long_name, "p@ss").validate().is_err());

        let long_secret = "s".repeat(MAX_SECRET_LENGTH + 1);
        assert!(LoginCredentials::new("alice", long_secret).validate().is_err());
    }

    #[test]
    fn test_body_shape_and_redaction() {
        let creds = LoginCredentials::new(" alice ", "p@ss");
        let body = serde_json::to_value(&creds).expect("serialize credentials");
        assert_eq!(body, serde_json::json!({"identifier": "alice", "secret": "p@ss"}));
        assert!(!format!("{:?}", creds).contains("p@ss"));
    }
}
