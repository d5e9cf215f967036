//! HTTP client with bounded redirect following, timeout mapping and retry.

use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::{Client, StatusCode, Url, header::LOCATION, redirect};
use std::time::Duration;

use super::retry::{RetryPolicy, classify_status, is_retryable};
use crate::error::InstallerError;

/// Default cap on redirect hops per request.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Default bound on a single request, including reading the body.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const REDIRECT_STATUSES: [StatusCode; 5] = [
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::FOUND,
    StatusCode::SEE_OTHER,
    StatusCode::TEMPORARY_REDIRECT,
    StatusCode::PERMANENT_REDIRECT,
];

#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub user_agent: String,
    pub timeout: Duration,
    pub max_redirects: usize,
    pub retry: RetryPolicy,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            user_agent: format!("merobox-installer/{}", env!("MEROBOX_INSTALLER_VERSION")),
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            retry: RetryPolicy::default(),
        }
    }
}

/// HTTP client used for release downloads.
///
/// Redirects are followed by this type rather than by reqwest so the hop
/// count can be reported as [`InstallerError::TooManyRedirects`].
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    options: HttpOptions,
}

impl HttpClient {
    pub fn new(options: HttpOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(options.user_agent.clone())
            .redirect(redirect::Policy::none())
            .timeout(options.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, options })
    }

    /// Downloads the full body of `url`.
    /// Automatically retries on transient errors.
    #[tracing::instrument(skip(self))]
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.with_retry("GET", || self.get_bytes_once(url)).await
    }

    /// Single attempt, following redirects up to the configured limit.
    async fn get_bytes_once(&self, url: &str) -> Result<Vec<u8>> {
        let mut current = Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
        let mut hops = 0;

        loop {
            debug!("GET {}", current);
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| self.map_transport_error(e, current.as_str()))?;

            let status = response.status();
            if REDIRECT_STATUSES.contains(&status) {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or_else(|| InstallerError::Http {
                        status: status.as_u16(),
                        url: current.to_string(),
                    })?;

                hops += 1;
                if hops > self.options.max_redirects {
                    return Err(InstallerError::TooManyRedirects {
                        url: url.to_string(),
                        limit: self.options.max_redirects,
                    }
                    .into());
                }

                let next = current
                    .join(location)
                    .with_context(|| format!("Invalid redirect location: {}", location))?;
                debug!("{} redirected to {}", current, next);
                current = next;
                continue;
            }

            classify_status(status, current.as_str())?;

            let bytes = response
                .bytes()
                .await
                .map_err(|e| self.map_transport_error(e, current.as_str()))?;

            debug!(
                "Downloaded {:.2} MB from {}",
                bytes.len() as f64 / (1024.0 * 1024.0),
                current
            );
            return Ok(bytes.to_vec());
        }
    }

    fn map_transport_error(&self, e: reqwest::Error, url: &str) -> anyhow::Error {
        if e.is_timeout() {
            InstallerError::Timeout {
                url: url.to_string(),
                after: self.options.timeout,
            }
            .into()
        } else {
            anyhow::Error::from(e).context(format!("Request to {} failed", url))
        }
    }

    /// Executes an async operation with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let attempts = self.options.retry.attempts.max(1);
        let delay = self.options.retry.delay;
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !is_retryable(&e) {
                        debug!("{}: non-retryable error: {}", operation_name, e);
                        return Err(e);
                    }
                    if attempt >= attempts {
                        return Err(e);
                    }
                    warn!(
                        "{}: attempt {}/{} failed ({:#}), retrying in {}ms...",
                        operation_name,
                        attempt,
                        attempts,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
