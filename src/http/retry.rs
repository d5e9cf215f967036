//! Retry policy for network operations with error classification.

use reqwest::StatusCode;
use std::time::Duration;

use crate::error::InstallerError;

/// Default number of attempts for a single download.
pub const MAX_RETRIES: usize = 3;

/// Default delay between attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: MAX_RETRIES,
            delay: Duration::from_millis(RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

/// Maps a final (non-redirect) response status to an error, if any.
pub fn classify_status(status: StatusCode, url: &str) -> Result<(), InstallerError> {
    if status == StatusCode::OK {
        return Ok(());
    }
    Err(InstallerError::Http {
        status: status.as_u16(),
        url: url.to_string(),
    })
}

/// Checks if an error is worth another attempt.
///
/// Only server errors (5xx) and failures talking to the server (connect,
/// send, body read) are retried. Anything else in the chain, such as an
/// unparseable URL, fails on the first attempt.
pub fn is_retryable(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| {
        if let Some(err) = cause.downcast_ref::<InstallerError>() {
            return err.is_retryable();
        }
        cause
            .downcast_ref::<reqwest::Error>()
            .is_some_and(is_transient_transport_error)
    })
}

/// Connection-level failures that a later attempt may not hit.
fn is_transient_transport_error(error: &reqwest::Error) -> bool {
    !error.is_timeout() && (error.is_connect() || error.is_request() || error.is_body())
}
