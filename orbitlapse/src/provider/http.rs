//! HTTP client abstraction for testability

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, RANGE};

use super::types::ProviderError;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Trait for HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests. All calls block until the
/// response body has been read.
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP GET request.
    fn get(&self, url: &str) -> Result<Vec<u8>, ProviderError>;

    /// Performs an HTTP GET request with a bearer token.
    fn get_authorized(&self, url: &str, token: &str) -> Result<Vec<u8>, ProviderError>;

    /// Fetches `length` bytes starting at `offset` with a Range request.
    ///
    /// Servers may return fewer bytes at the end of the resource.
    fn get_range(&self, url: &str, offset: u64, length: u64) -> Result<Vec<u8>, ProviderError>;

    /// POSTs a JSON body, optionally with a bearer token.
    fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        token: Option<&str>,
    ) -> Result<Vec<u8>, ProviderError>;
}

/// Real HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with default configuration.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a new ReqwestClient with custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("orbitlapse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ProviderError::HttpError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    fn execute(
        &self,
        request: reqwest::blocking::RequestBuilder,
        url: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        let response = request
            .send()
            .map_err(|e| ProviderError::HttpError(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ProviderError::Auth(format!("HTTP {} from {}", status, url)));
        }
        if !status.is_success() {
            return Err(ProviderError::HttpError(format!(
                "HTTP {} from {}",
                status, url
            )));
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| ProviderError::HttpError(format!("Failed to read response: {}", e)))
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        self.execute(self.client.get(url), url)
    }

    fn get_authorized(&self, url: &str, token: &str) -> Result<Vec<u8>, ProviderError> {
        let request = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", token));
        self.execute(request, url)
    }

    fn get_range(&self, url: &str, offset: u64, length: u64) -> Result<Vec<u8>, ProviderError> {
        if length == 0 {
            return Ok(Vec::new());
        }
        let range = format!("bytes={}-{}", offset, offset + length - 1);
        let mut body = self.execute(self.client.get(url).header(RANGE, range), url)?;

        // A server that ignores Range sends the whole resource.
        if body.len() as u64 > length {
            let start = (offset as usize).min(body.len());
            let end = (start + length as usize).min(body.len());
            body = body[start..end].to_vec();
        }
        Ok(body)
    }

    fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        token: Option<&str>,
    ) -> Result<Vec<u8>, ProviderError> {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        self.execute(request, url)
    }
}
