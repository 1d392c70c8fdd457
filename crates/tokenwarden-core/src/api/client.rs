//! API client for bearer-authenticated calls to the backend.
//!
//! This module provides the `ApiClient` struct the rest of an application
//! uses once logged in. It reads the token from the `SessionManager` on
//! every request, so renewals are picked up without rebuilding the client.

use std::time::Duration;

use anyhow::Result;
use reqwest::{header, Client, Method, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::ApiError;
use crate::auth::SessionManager;
use crate::config::Config;

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
/// 1 second is polite to the server while not making users wait too long.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Upper bound on a server-requested wait before retrying.
const MAX_RATE_LIMIT_WAIT_SECS: u64 = 30;

/// Authenticated JSON client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: SessionManager,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(config: &Config, session: SessionManager) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(client, config.api_base(), session))
    }

    /// Create an ApiClient sharing an existing connection pool
    pub fn with_client(client: Client, base_url: &str, session: SessionManager) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Bearer headers plus the token they carry, so a rejection can be
    /// matched against the session that was current when the request left.
    fn auth_headers(&self) -> Result<(header::HeaderMap, String), ApiError> {
        let token = self.session.access_token().ok_or(ApiError::NotAuthenticated)?;
        let mut headers = header::HeaderMap::new();
        let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ApiError::InvalidResponse("Access token is not a valid header value".to_string()))?;
        headers.insert(header::AUTHORIZATION, value);
        Ok((headers, token))
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors. A 401 ends the session if `sent_token` is
    /// still the current token.
    async fn check_response_for_retry(
        &self,
        response: Response,
        sent_token: &str,
        last_attempt: bool,
    ) -> Result<Option<Response>, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(Some(response));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS && !last_attempt {
            return Ok(None);
        }

        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();
        let err = ApiError::from_status(status, &body).with_retry_after_header(retry_after.as_deref());

        if matches!(err, ApiError::Unauthorized(_)) && self.session.expire_session_for(sent_token) {
            warn!("Request rejected with 401, session ended");
        }
        Err(err)
    }

    async fn request<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let (headers, sent_token) = self.auth_headers()?;
            let mut request = self.client.request(method.clone(), &url).headers(headers);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await?;
            let server_wait = retry_after_header(&response);

            match self
                .check_response_for_retry(response, &sent_token, retries >= MAX_RATE_LIMIT_RETRIES)
                .await
            {
                Ok(Some(response)) => {
                    return response.json().await.map_err(|e| {
                        ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
                    });
                }
                Ok(None) => {
                    // Rate limited - wait and retry
                    retries += 1;
                    let wait = Duration::from_millis(backoff_ms)
                        .max(server_wait.unwrap_or_default())
                        .min(Duration::from_secs(MAX_RATE_LIMIT_WAIT_SECS));
                    warn!(url = %url, retry = retries, wait_ms = wait.as_millis() as u64, "Rate limited, backing off");
                    tokio::time::sleep(wait).await;
                    backoff_ms *= 2; // Exponential backoff
                }
                Err(err) => {
                    debug!(url = %url, error = %err, "Request failed");
                    return Err(err);
                }
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request::<T, ()>(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request::<T, ()>(Method::DELETE, path, None).await
    }
}

/// Seconds from a `Retry-After` header, if present and numeric
fn retry_after_header(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
