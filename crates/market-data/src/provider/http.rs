//! Shared HTTP plumbing for provider clients.
//!
//! Every client goes through [`HttpClient`] so that transport failures map to
//! the same [`ProviderError`] variants regardless of upstream.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::ProviderError;

/// Transport-level timeout. The router applies a tighter per-attempt budget
/// on top of this.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = "Mozilla/5.0 (compatible; stockgate/0.4)";

/// Longest body excerpt carried in an error message.
const MAX_ERROR_BODY: usize = 200;

/// JSON-over-HTTP client bound to one provider and base URL.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
    provider: &'static str,
    base_url: String,
}

impl HttpClient {
    pub fn new(provider: &'static str, base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            provider,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` relative to the base URL and parse the body as JSON.
    pub async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
        headers: &[(&str, &str)],
    ) -> Result<Value, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(&url).query(query);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        debug!(
            "{} request: GET {} with {} params",
            self.provider,
            path,
            query.len()
        );
        self.send(request).await
    }

    /// POST a JSON body to `path` and parse the response as JSON.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} request: POST {}", self.provider, path);
        self.send(self.client.post(&url).json(body)).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, ProviderError> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(self.status_error(status, &text));
        }

        serde_json::from_str(&text).map_err(|e| {
            warn!("{} returned a non-JSON body: {}", self.provider, e);
            ProviderError::Upstream(format!("Invalid JSON: {}", e))
        })
    }

    fn transport_error(&self, error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout {
                after_ms: CLIENT_TIMEOUT.as_millis() as u64,
            }
        } else {
            ProviderError::Network(format!("Request failed: {}", error))
        }
    }

    fn status_error(&self, status: StatusCode, body: &str) -> ProviderError {
        match status {
            // 403 is how several free tiers report an exhausted quota
            StatusCode::TOO_MANY_REQUESTS | StatusCode::FORBIDDEN => {
                warn!("{} rate limited (HTTP {})", self.provider, status.as_u16());
                ProviderError::RateLimited
            }
            StatusCode::UNAUTHORIZED => ProviderError::Http {
                status: status.as_u16(),
                message: "Invalid or missing API key".to_string(),
            },
            StatusCode::NOT_FOUND => ProviderError::SymbolNotFound(excerpt(body)),
            _ => ProviderError::Http {
                status: status.as_u16(),
                message: excerpt(body),
            },
        }
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
