use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited {
        retry_after: Option<Duration>,
        message: String,
    },

    #[error("Request rejected ({status}): {detail}")]
    ClientError { status: u16, detail: String },

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No active session")]
    NotAuthenticated,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error body shape shared by the backend's 4xx responses.
///
/// `detail` is either a plain string or a list of validation entries
/// (`[{"msg": "..."}]`); rate-limit responses carry `message` and
/// `retry_after_seconds` instead.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    retry_after_seconds: Option<u64>,
}

impl ErrorBody {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    /// Human-readable reason, if the body carries one
    fn reason(&self) -> Option<String> {
        let from_detail = match &self.detail {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .find_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .map(str::to_string),
            _ => None,
        };
        from_detail
            .or_else(|| self.message.clone())
            .filter(|s| !s.trim().is_empty())
    }
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let parsed = ErrorBody::parse(body);
        let detail = parsed
            .reason()
            .unwrap_or_else(|| Self::truncate_body(body));
        match status.as_u16() {
            401 => ApiError::Unauthorized(detail),
            403 => ApiError::AccessDenied(detail),
            404 => ApiError::NotFound(detail),
            429 => ApiError::RateLimited {
                retry_after: parsed.retry_after_seconds.map(Duration::from_secs),
                message: detail,
            },
            400..=499 => ApiError::ClientError {
                status: status.as_u16(),
                detail,
            },
            500..=599 => ApiError::ServerError(detail),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, detail)),
        }
    }

    /// Fill in a missing rate-limit delay from a `Retry-After` header value.
    ///
    /// Only the delta-seconds form is understood; HTTP dates are ignored.
    pub fn with_retry_after_header(self, header: Option<&str>) -> Self {
        match self {
            ApiError::RateLimited {
                retry_after: None,
                message,
            } => ApiError::RateLimited {
                retry_after: header
                    .and_then(|h| h.trim().parse::<u64>().ok())
                    .map(Duration::from_secs),
                message,
            },
            other => other,
        }
    }

    /// The backend-supplied reason for a rejected request, if any
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized(d)
            | ApiError::AccessDenied(d)
            | ApiError::NotFound(d)
            | ApiError::ClientError { detail: d, .. } => Some(d.as_str()),
            ApiError::RateLimited { message, .. } => Some(message.as_str()),
            _ => None,
        }
        .filter(|d| !d.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_unauthorized_uses_detail() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, r#"{"detail":"Invalid credentials"}"#);
        match err {
            ApiError::Unauthorized(detail) => assert_eq!(detail, "Invalid credentials"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_status_validation_detail_list() {
        let body = r#"{"detail":[{"loc":["body","secret"],"msg":"field required","type":"missing"}]}"#;
        let err = ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, body);
        match err {
            ApiError::ClientError { status, detail } => {
                assert_eq!(status, 422);
                assert_eq!(detail, "field required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_status_rate_limited() {
        let body = r#"{"message":"Too many attempts","retry_after_seconds":42}"#;
        let err = ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, body);
        match err {
            ApiError::RateLimited { retry_after, message } => {
                assert_eq!(retry_after, Some(Duration::from_secs(42)));
                assert_eq!(message, "Too many attempts");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_retry_after_header_only_fills_missing_delay() {
        let err = ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, "")
            .with_retry_after_header(Some("17"));
        assert!(matches!(
            err,
            ApiError::RateLimited { retry_after: Some(d), .. } if d == Duration::from_secs(17)
        ));

        let err = ApiError::from_status(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"retry_after_seconds":5}"#,
        )
        .with_retry_after_header(Some("17"));
        assert!(matches!(
            err,
            ApiError::RateLimited { retry_after: Some(d), .. } if d == Duration::from_secs(5)
        ));
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &long);
        match err {
            ApiError::ServerError(detail) => {
                assert!(detail.contains("truncated"));
                assert!(detail.len() < long.len() + 40);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_detail_accessor() {
        assert_eq!(ApiError::Unauthorized("nope".into()).detail(), Some("nope"));
        assert_eq!(ApiError::Unauthorized(String::new()).detail(), None);
        assert_eq!(ApiError::NotAuthenticated.detail(), None);
    }
}
