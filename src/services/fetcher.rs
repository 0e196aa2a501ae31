// src/services/fetcher.rs

//! Request execution with retry, backoff and a fixed inter-request delay.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;
use crate::utils::http::{HttpRequest, Transport};

/// Delay and retry settings for one [`Fetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request
    pub max_attempts: u32,
    /// Slept once after every fetch, whatever the outcome
    pub request_delay: Duration,
    /// First backoff interval, doubled per attempt
    pub backoff_base: Duration,
    /// First backoff interval after a 429, doubled per attempt
    pub rate_limit_base: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            request_delay: config.request_delay(),
            backoff_base: config.backoff_base(),
            rate_limit_base: config.rate_limit_backoff(),
        }
    }

    /// Wait after failed attempt `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Wait after a 429 on attempt `attempt`, honoring a larger `Retry-After`.
    pub fn rate_limit_backoff(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        let computed = self
            .rate_limit_base
            .saturating_mul(2u32.saturating_pow(attempt));
        match retry_after_secs {
            Some(secs) => computed.max(Duration::from_secs(secs)),
            None => computed,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

enum Failure {
    RateLimited,
    Other(String),
}

/// Executes requests one at a time under a [`RetryPolicy`].
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Fetch the response body as text.
    pub async fn fetch_text(&self, request: &HttpRequest) -> Result<String> {
        self.fetch_with(request, Ok).await
    }

    /// Fetch and parse the response body as JSON.
    pub async fn fetch_json(&self, request: &HttpRequest) -> Result<serde_json::Value> {
        self.fetch_with(request, |body| Ok(serde_json::from_str(&body)?))
            .await
    }

    /// Fetch and run `decode` on a 2xx body.
    ///
    /// A decode error counts as a failed attempt and is retried like a bad status.
    pub async fn fetch_with<T, F>(&self, request: &HttpRequest, decode: F) -> Result<T>
    where
        T: Send,
        F: Fn(String) -> Result<T> + Send + Sync,
    {
        let result = self.attempt(request, &decode).await;

        if !self.policy.request_delay.is_zero() {
            tokio::time::sleep(self.policy.request_delay).await;
        }

        result
    }

    async fn attempt<T, F>(&self, request: &HttpRequest, decode: &F) -> Result<T>
    where
        T: Send,
        F: Fn(String) -> Result<T> + Send + Sync,
    {
        let attempts = self.policy.max_attempts;
        let mut last_failure = Failure::Other("no attempt made".to_string());

        for attempt in 0..attempts {
            log::debug!(
                "Fetching {} (attempt {}/{})",
                request.url,
                attempt + 1,
                attempts
            );

            let wait = match self.transport.execute(request).await {
                Ok(response) if response.is_success() => match decode(response.body) {
                    Ok(value) => return Ok(value),
                    Err(e) => {
                        log::warn!("Malformed response from {}: {}", request.url, e);
                        last_failure = Failure::Other(format!("malformed response: {e}"));
                        self.policy.backoff(attempt)
                    }
                },
                Ok(response) if response.is_rate_limited() => {
                    let wait = self
                        .policy
                        .rate_limit_backoff(attempt, response.retry_after_secs);
                    log::warn!(
                        "Rate limited by {}. Waiting {:?} before retrying...",
                        request.url,
                        wait
                    );
                    last_failure = Failure::RateLimited;
                    wait
                }
                Ok(response) => {
                    log::warn!("HTTP {} for {}", response.status, request.url);
                    last_failure = Failure::Other(format!("HTTP {}", response.status));
                    self.policy.backoff(attempt)
                }
                Err(e) => {
                    log::warn!("Error fetching {}: {}", request.url, e);
                    last_failure = Failure::Other(e.to_string());
                    self.policy.backoff(attempt)
                }
            };

            if attempt + 1 < attempts {
                tokio::time::sleep(wait).await;
            }
        }

        Err(match last_failure {
            Failure::RateLimited => AppError::RateLimited {
                context: request.url.clone(),
                attempts,
            },
            Failure::Other(message) => AppError::network(request.url.clone(), message),
        })
    }
}
