//! HTTP client module with redirect, timeout and retry handling.

mod client;
mod retry;

pub use client::{DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT, HttpClient, HttpOptions};
pub use retry::{MAX_RETRIES, RETRY_DELAY_MS, RetryPolicy, classify_status, is_retryable};
