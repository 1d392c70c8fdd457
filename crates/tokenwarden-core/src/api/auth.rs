//! HTTP implementation of the auth backend contract.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{header, Client, Response};
use tracing::debug;

use super::ApiError;
use crate::auth::{AuthBackend, LoginCredentials, TokenGrant};
use crate::config::Config;

const LOGIN_PATH: &str = "/login";
const REFRESH_PATH: &str = "/refresh";
const LOGOUT_PATH: &str = "/logout";

/// Talks to the auth backend over REST/JSON.
///
/// The client keeps a cookie store so the HTTP-only renewal cookie set by
/// `/login` is sent back on `/refresh` and `/logout`.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .cookie_store(true)
            .build()?;
        Ok(Self::with_client(client, config.api_base()))
    }

    /// Use an existing client, e.g. to share its cookie jar and connection pool
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning a classified error if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body).with_retry_after_header(retry_after.as_deref()))
    }

    async fn parse_grant(response: Response) -> Result<TokenGrant, ApiError> {
        let grant: TokenGrant = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse token response: {}", e)))?;
        if grant.access_token.trim().is_empty() {
            return Err(ApiError::InvalidResponse(
                "Token response has an empty access_token".to_string(),
            ));
        }
        Ok(grant)
    }
}

#[async_trait]
impl AuthBackend for HttpBackend {
    async fn login(&self, credentials: &LoginCredentials) -> Result<TokenGrant, ApiError> {
        let url = self.url(LOGIN_PATH);
        debug!(url = %url, "Sending login request");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(credentials)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse_grant(response).await
    }

    async fn refresh(&self) -> Result<TokenGrant, ApiError> {
        let url = self.url(REFRESH_PATH);
        debug!(url = %url, "Sending refresh request");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse_grant(response).await
    }

    async fn logout(&self, access_token: Option<&str>) -> Result<(), ApiError> {
        let url = self.url(LOGOUT_PATH);
        debug!(url = %url, "Sending logout request");

        let mut request = self.client.post(&url);
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        Self::check_response(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalised() {
        let backend = HttpBackend::with_client(Client::new(), "http://localhost:8000/api/");
        assert_eq!(backend.base_url(), "http://localhost:8000/api");
        assert_eq!(backend.url(LOGIN_PATH), "http://localhost:8000/api/login");
    }

    #[test]
    fn test_new_from_config() {
        let backend = HttpBackend::new(&Config::default()).expect("build backend");
        assert_eq!(backend.url(REFRESH_PATH), "http://localhost:8000/api/refresh");
    }
}
