//! Bounded HTTP fetcher
//!
//! Every network request made while enriching a record goes through
//! [`Fetcher`]. A fetch:
//! - Is refused without a network attempt when the host is in backoff or
//!   the record's budget is spent
//! - Follows a bounded number of redirects
//! - Streams the body and stops at the byte cap or the budget deadline
//! - Accepts only 2xx/3xx responses with an acceptable content type
//! - Retries 429 and 5xx responses with exponential backoff
//! - Reports the outcome to the host circuit breaker

use crate::config::{Config, FetcherConfig, UserAgentConfig};
use crate::state::{Budget, HostCircuitBreaker};
use crate::url::{host_key_of, parse_site_url};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{redirect::Policy, Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Body decoded as UTF-8 (lossy), possibly truncated at the byte cap
    pub body: String,

    /// Final URL after redirects
    pub final_url: Url,

    /// HTTP status code
    pub status_code: u16,

    /// Content-Type header value
    pub content_type: String,

    /// True if the body was cut at the byte cap or the deadline
    pub truncated: bool,
}

/// Reasons a fetch produced no page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The record's fetch count or deadline is spent
    #[error("fetch budget exhausted")]
    BudgetExhausted,

    /// The host's circuit is open
    #[error("host {host} is in backoff")]
    HostBackoff { host: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Final response status outside 2xx/3xx
    #[error("HTTP status {code}")]
    Status { code: u16 },

    /// Content type not accepted for this kind of fetch
    #[error("unsupported content type: {content_type:?}")]
    ContentType { content_type: String },

    /// Connection, TLS, redirect or body read failure
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,
}

impl FetchError {
    /// Returns true for refusals that happen before any network attempt
    ///
    /// These are not counted against the host.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            FetchError::BudgetExhausted | FetchError::HostBackoff { .. } | FetchError::InvalidUrl(_)
        )
    }
}

/// Content types accepted by a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Accept {
    /// `text/html` or `application/xhtml+xml`
    Markup,
    /// Any `text/*` or XML type (robots.txt, sitemaps)
    Text,
}

impl Accept {
    fn allows(&self, content_type: &str) -> bool {
        let content_type = content_type.to_ascii_lowercase();
        match self {
            Accept::Markup => {
                content_type.contains("text/html") || content_type.contains("application/xhtml+xml")
            }
            Accept::Text => content_type.starts_with("text/") || content_type.contains("xml"),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// The client owns one connection pool; build one per worker and reuse it
/// for every record that worker processes. No overall client timeout is
/// set because each request gets its own, capped by the record's budget.
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `fetcher` - Timeouts and redirect limit
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    fetcher: &FetcherConfig,
) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.8"));

    Client::builder()
        .user_agent(user_agent.header_value())
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(fetcher.connect_timeout_secs))
        .redirect(Policy::limited(fetcher.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Budget- and breaker-aware HTTP fetcher
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    breaker: Arc<HostCircuitBreaker>,
    config: FetcherConfig,
}

impl Fetcher {
    /// Creates a fetcher around an existing client
    pub fn new(client: Client, breaker: Arc<HostCircuitBreaker>, config: FetcherConfig) -> Self {
        Self {
            client,
            breaker,
            config,
        }
    }

    /// Builds a fresh client and fetcher from configuration
    pub fn from_config(
        config: &Config,
        breaker: Arc<HostCircuitBreaker>,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.user_agent, &config.fetcher)?;
        Ok(Self::new(client, breaker, config.fetcher.clone()))
    }

    /// The circuit breaker this fetcher reports to
    pub fn breaker(&self) -> &Arc<HostCircuitBreaker> {
        &self.breaker
    }

    /// Fetches an HTML page
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL, or a bare domain completed with `http://`
    /// * `budget` - The current record's budget; one fetch is consumed
    ///   unless the host is in backoff
    pub async fn fetch(&self, url: &str, budget: &mut Budget) -> Result<FetchedPage, FetchError> {
        self.fetch_accepting(url, budget, Accept::Markup).await
    }

    /// Fetches a text resource such as robots.txt or a sitemap
    pub async fn fetch_text(
        &self,
        url: &str,
        budget: &mut Budget,
    ) -> Result<FetchedPage, FetchError> {
        self.fetch_accepting(url, budget, Accept::Text).await
    }

    async fn fetch_accepting(
        &self,
        url: &str,
        budget: &mut Budget,
        accept: Accept,
    ) -> Result<FetchedPage, FetchError> {
        let url = parse_site_url(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        let host = host_key_of(&url);

        if !self.breaker.allow_request(&host) {
            tracing::debug!(url = %url, "skipping fetch, host in backoff");
            return Err(FetchError::HostBackoff { host });
        }

        if !budget.try_consume_fetch() {
            tracing::debug!(url = %url, "skipping fetch, budget exhausted");
            return Err(FetchError::BudgetExhausted);
        }

        let result = self.execute(&url, budget, accept).await;

        match &result {
            Ok(page) => {
                tracing::debug!(
                    url = %url,
                    final_url = %page.final_url,
                    bytes = page.body.len(),
                    truncated = page.truncated,
                    "fetched"
                );
                self.breaker.record_success(&host);
            }
            Err(error) => {
                tracing::debug!(url = %url, %error, "fetch failed");
                self.breaker.record_failure(&host);
            }
        }

        result
    }

    /// Sends the request, retrying transient statuses, and reads the body
    async fn execute(
        &self,
        url: &Url,
        budget: &Budget,
        accept: Accept,
    ) -> Result<FetchedPage, FetchError> {
        let mut attempt: u32 = 0;

        loop {
            let remaining = budget.time_remaining();
            if remaining.is_zero() {
                return Err(FetchError::Timeout);
            }

            let timeout = remaining.min(Duration::from_secs(self.config.request_timeout_secs));
            let response = self
                .client
                .get(url.clone())
                .timeout(timeout)
                .send()
                .await
                .map_err(classify_error)?;

            let status = response.status();

            if is_transient(status) && attempt < self.config.max_retries {
                let wait = retry_after(&response)
                    .unwrap_or_else(|| backoff_delay(self.config.retry_backoff_ms, attempt));

                // No point waiting if the deadline passes first
                if wait >= budget.time_remaining() {
                    return Err(FetchError::Status {
                        code: status.as_u16(),
                    });
                }

                tracing::debug!(
                    url = %url,
                    status = status.as_u16(),
                    attempt = attempt + 1,
                    wait_ms = wait.as_millis() as u64,
                    "retrying transient response"
                );
                drop(response);
                tokio::time::sleep(budget.clamp(wait)).await;
                attempt += 1;
                continue;
            }

            if !(status.is_success() || status.is_redirection()) {
                return Err(FetchError::Status {
                    code: status.as_u16(),
                });
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();

            if !accept.allows(&content_type) {
                return Err(FetchError::ContentType { content_type });
            }

            let final_url = response.url().clone();
            let (bytes, truncated) =
                read_capped(response, self.config.max_body_bytes, budget).await?;

            return Ok(FetchedPage {
                body: String::from_utf8_lossy(&bytes).into_owned(),
                final_url,
                status_code: status.as_u16(),
                content_type,
                truncated,
            });
        }
    }
}

/// Streams a response body up to `max_bytes` or the budget deadline
///
/// Returns the bytes read and whether reading stopped early.
async fn read_capped(
    mut response: Response,
    max_bytes: usize,
    budget: &Budget,
) -> Result<(Vec<u8>, bool), FetchError> {
    let mut body = Vec::new();

    loop {
        let chunk = match response.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            // The request timeout is capped to the deadline; keep what arrived
            Err(error) if error.is_timeout() && !body.is_empty() => return Ok((body, true)),
            Err(error) => return Err(classify_error(error)),
        };

        let room = max_bytes.saturating_sub(body.len());
        if chunk.len() > room {
            body.extend_from_slice(&chunk[..room]);
            return Ok((body, true));
        }
        body.extend_from_slice(&chunk);

        if budget.is_expired() {
            return Ok((body, true));
        }
    }

    Ok((body, false))
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// `Retry-After` in delta-seconds form; HTTP dates are ignored
fn retry_after(response: &Response) -> Option<Duration> {
    parse_retry_after(response.headers().get(RETRY_AFTER)?.to_str().ok()?)
}

fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// `base * 2^attempt`, saturating
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor))
}

fn classify_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(error.to_string())
    }
}
