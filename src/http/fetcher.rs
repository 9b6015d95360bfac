//! HTTP page fetcher
//!
//! Issues exactly one GET per call and never retries on its own: the retry
//! and backoff policy belongs to the downloader, which decides on the
//! returned [`FetchOutcome`].

use super::rate_limit::RateLimiter;
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Characters of an undecodable body kept for diagnostics
const BODY_PREVIEW_CHARS: usize = 200;

// ============================================================================
// Fetch Outcome
// ============================================================================

/// Classified result of fetching one page
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// 2xx response with a JSON body
    Success(Value),
    /// HTTP 429, worth retrying after a pause
    RateLimited,
    /// Any other 4xx/5xx status
    HttpError(u16),
    /// Connection refused, DNS failure or timeout
    ConnectionError(String),
    /// 2xx response whose body is not JSON
    MalformedResponse(String),
    /// Anything else
    UnexpectedError(String),
}

impl FetchOutcome {
    /// Whether the page payload is available
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Short label for logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::RateLimited => "rate_limited",
            Self::HttpError(_) => "http_error",
            Self::ConnectionError(_) => "connection_error",
            Self::MalformedResponse(_) => "malformed_response",
            Self::UnexpectedError(_) => "unexpected_error",
        }
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(_) => write!(f, "success"),
            Self::RateLimited => write!(f, "rate limited (429)"),
            Self::HttpError(status) => write!(f, "HTTP {status}"),
            Self::ConnectionError(detail) => write!(f, "connection error: {detail}"),
            Self::MalformedResponse(detail) => write!(f, "malformed response: {detail}"),
            Self::UnexpectedError(detail) => write!(f, "unexpected error: {detail}"),
        }
    }
}

// ============================================================================
// Page Source
// ============================================================================

/// Anything that can produce the payload of a numbered page
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch one page; must not retry internally
    async fn fetch_page(&self, page: u32) -> FetchOutcome;
}

// ============================================================================
// Page Fetcher
// ============================================================================

/// HTTP implementation of [`PageSource`]
pub struct PageFetcher {
    client: Client,
    endpoint: Url,
    page_param: String,
    timeout: Duration,
    rate_limiter: Option<RateLimiter>,
}

impl PageFetcher {
    /// Build a fetcher from the API section of the configuration
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)?;
        let timeout = Duration::from_secs(config.request_timeout_secs);

        let mut headers = HeaderMap::new();
        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(token)
                .map_err(|e| Error::invalid_value("api.token", e.to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("{}/{}", crate::NAME, crate::VERSION))
            .default_headers(headers)
            .build()?;

        let rate_limiter = config.requests_per_second.map(RateLimiter::per_second);

        Ok(Self {
            client,
            endpoint,
            page_param: config.page_param.clone(),
            timeout,
            rate_limiter,
        })
    }

    /// URL requested for `page`
    pub fn page_url(&self, page: u32) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair(&self.page_param, &page.to_string());
        url
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Fetch one page and classify the result
    pub async fn fetch(&self, page: u32) -> FetchOutcome {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.acquire().await;
        }

        let url = self.page_url(page);
        debug!(page, %url, "GET");

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return classify_transport_error(&e),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return FetchOutcome::RateLimited;
        }
        if status.is_client_error() || status.is_server_error() {
            return FetchOutcome::HttpError(status.as_u16());
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return classify_transport_error(&e),
        };

        decode_body(&body)
    }
}

#[async_trait]
impl PageSource for PageFetcher {
    async fn fetch_page(&self, page: u32) -> FetchOutcome {
        self.fetch(page).await
    }
}

impl fmt::Debug for PageFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageFetcher")
            .field("endpoint", &self.endpoint.as_str())
            .field("page_param", &self.page_param)
            .field("timeout", &self.timeout)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Decode a successful body, keeping a preview when it is not JSON
fn decode_body(body: &str) -> FetchOutcome {
    match serde_json::from_str(body) {
        Ok(value) => FetchOutcome::Success(value),
        Err(e) => {
            let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
            FetchOutcome::MalformedResponse(format!("{e}; body starts with '{preview}'"))
        }
    }
}

/// Map a reqwest failure onto a fetch outcome
fn classify_transport_error(e: &reqwest::Error) -> FetchOutcome {
    if e.is_connect() || e.is_timeout() {
        FetchOutcome::ConnectionError(e.to_string())
    } else {
        FetchOutcome::UnexpectedError(e.to_string())
    }
}
