use std::time::Duration;

use thiserror::Error;

use crate::api::ApiError;
use crate::utils::format_countdown;

/// Used when a 429 carries neither `retry_after_seconds` nor `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Failures the session manager reports to the application.
///
/// Transport errors are converted at the manager boundary and never leak
/// past it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Rate limited - retry after {}s", .0.as_secs())]
    RateLimited(Duration),

    #[error("Connectivity failure: {0}")]
    ConnectivityFailure(String),

    #[error("Session expired")]
    SessionExpired,
}

impl AuthFailure {
    /// Classify a failed `/login` call
    pub fn from_login_error(err: ApiError) -> Self {
        match &err {
            ApiError::RateLimited { retry_after, .. } => AuthFailure::RateLimited(
                (*retry_after).unwrap_or(Duration::from_secs(DEFAULT_RETRY_AFTER_SECS)),
            ),
            ApiError::Unauthorized(_)
            | ApiError::AccessDenied(_)
            | ApiError::NotFound(_)
            | ApiError::ClientError { .. } => AuthFailure::InvalidCredentials(
                err.detail()
                    .unwrap_or("Invalid username or password")
                    .to_string(),
            ),
            ApiError::NetworkError(e) if e.is_timeout() => {
                AuthFailure::ConnectivityFailure("Connection timed out".to_string())
            }
            other => AuthFailure::ConnectivityFailure(other.to_string()),
        }
    }

    /// Message suitable for showing next to a login form
    pub fn user_message(&self) -> String {
        match self {
            AuthFailure::InvalidCredentials(reason) => reason.clone(),
            AuthFailure::RateLimited(wait) => format!(
                "Too many login attempts. Try again in {}.",
                format_countdown(*wait)
            ),
            AuthFailure::ConnectivityFailure(_) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            AuthFailure::SessionExpired => "Your session has expired. Please log in again.".to_string(),
        }
    }

    /// Whether resubmitting unchanged input can succeed later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuthFailure::RateLimited(_) | AuthFailure::ConnectivityFailure(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_error_classification() {
        assert_eq!(
            AuthFailure::from_login_error(ApiError::Unauthorized("Invalid credentials".into())),
            AuthFailure::InvalidCredentials("Invalid credentials".into())
        );
        assert_eq!(
            AuthFailure::from_login_error(ApiError::Unauthorized(String::new())),
            AuthFailure::InvalidCredentials("Invalid username or password".into())
        );
        assert_eq!(
            AuthFailure::from_login_error(ApiError::ClientError {
                status: 422,
                detail: "field required".into()
            }),
            AuthFailure::InvalidCredentials("field required".into())
        );
        assert!(matches!(
            AuthFailure::from_login_error(ApiError::ServerError("boom".into())),
            AuthFailure::ConnectivityFailure(_)
        ));
        assert!(matches!(
            AuthFailure::from_login_error(ApiError::InvalidResponse("bad json".into())),
            AuthFailure::ConnectivityFailure(_)
        ));
    }

    #[test]
    fn test_rate_limit_delay() {
        let failure = AuthFailure::from_login_error(ApiError::RateLimited {
            retry_after: Some(Duration::from_secs(42)),
            message: String::new(),
        });
        assert_eq!(failure, AuthFailure::RateLimited(Duration::from_secs(42)));
        assert!(failure.user_message().contains("42s"));

        let failure = AuthFailure::from_login_error(ApiError::RateLimited {
            retry_after: None,
            message: String::new(),
        });
        assert_eq!(
            failure,
            AuthFailure::RateLimited(Duration::from_secs(DEFAULT_RETRY_AFTER_SECS))
        );
    }

    #[test]
    fn test_retryable() {
        assert!(AuthFailure::RateLimited(Duration::from_secs(1)).is_retryable());
        assert!(AuthFailure::ConnectivityFailure("down".into()).is_retryable());
        assert!(!AuthFailure::InvalidCredentials("no".into()).is_retryable());
        assert!(!AuthFailure::SessionExpired.is_retryable());
    }
}
