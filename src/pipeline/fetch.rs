//! Avatar retrieval with bounded retry.

use std::time::Duration;

use image::DynamicImage;
use reqwest::{StatusCode, Url};
use tracing::{debug, instrument, warn};

use super::codec::decode_image;
use crate::constants::{
    FETCH_BACKOFF_FACTOR, FETCH_MAX_BODY_BYTES, FETCH_MAX_RETRIES, FETCH_RETRY_STATUSES,
    FETCH_TIMEOUT, FETCH_USER_AGENT,
};
use crate::error::{FetchError, PipelineErrorKind};

/// How the fetcher retries transient failures.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Attempts made after the first one
    pub max_retries: u32,
    /// Statuses that count as transient
    pub retry_statuses: Vec<u16>,
    /// Delay before retry `n` is `backoff_factor * 2^(n-1)`
    pub backoff_factor: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: FETCH_MAX_RETRIES,
            retry_statuses: FETCH_RETRY_STATUSES.to_vec(),
            backoff_factor: FETCH_BACKOFF_FACTOR,
        }
    }
}

impl RetryPolicy {
    /// The default policy with no delay between attempts.
    pub fn immediate() -> Self {
        Self {
            backoff_factor: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Whether a response with this status should be retried.
    pub fn retries_status(&self, status: StatusCode) -> bool {
        self.retry_statuses.contains(&status.as_u16())
    }

    /// Delay before the given retry (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.backoff_factor.saturating_mul(1u32 << exponent)
    }
}

/// Downloads remote images.
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
    policy: RetryPolicy,
    max_body: usize,
}

impl Fetcher {
    /// Builds a fetcher with the fixed user agent and request timeout.
    pub fn new(policy: RetryPolicy) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(FETCH_USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            policy,
            max_body: FETCH_MAX_BODY_BYTES,
        })
    }

    /// Overrides the largest body that will be buffered.
    pub fn with_max_body(mut self, max_body: usize) -> Self {
        self.max_body = max_body;
        self
    }

    /// Fetches `url` and decodes the body as an image.
    pub async fn fetch_image(&self, url: &str) -> Result<DynamicImage, PipelineErrorKind> {
        let body = self.fetch(url).await?;
        Ok(decode_image(&body, "avatar")?)
    }

    /// Fetches the raw body of `url`, retrying transient failures.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = parse_http_url(url)?;
        let mut retry = 0;
        loop {
            match self.client.get(parsed.clone()).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("GET {} -> {}", parsed, response.status());
                    return self.read_body(url, response).await;
                }
                Ok(response) => {
                    let status = response.status();
                    if retry >= self.policy.max_retries || !self.policy.retries_status(status) {
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status,
                        });
                    }
                    warn!("GET {} returned {}", parsed, status);
                }
                Err(source) => {
                    let transient = source.is_timeout() || source.is_connect();
                    if retry >= self.policy.max_retries || !transient {
                        return Err(FetchError::Transport {
                            url: url.to_string(),
                            source,
                        });
                    }
                    warn!("GET {} failed: {}", parsed, source);
                }
            }
            retry += 1;
            let delay = self.policy.delay_for(retry);
            warn!(
                "Retrying avatar fetch ({}/{}) in {:?}",
                retry, self.policy.max_retries, delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn read_body(
        &self,
        url: &str,
        mut response: reqwest::Response,
    ) -> Result<Vec<u8>, FetchError> {
        let too_large = || FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_body,
        };
        if response
            .content_length()
            .is_some_and(|len| len > self.max_body as u64)
        {
            return Err(too_large());
        }
        let mut body = Vec::new();
        // Content-Length is advisory.
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?
        {
            if body.len() + chunk.len() > self.max_body {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

fn parse_http_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|err| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: err.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(FetchError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}
