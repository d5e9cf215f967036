//! Error kinds surfaced by the resolver, installer and wrapper.
//!
//! Orchestration code works in `anyhow::Result` and recovers from specific
//! cases by downcasting to [`InstallerError`].

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallerError {
    /// Host OS or architecture outside the published release matrix.
    #[error("Unsupported platform: {os}/{arch}. Only macOS and Linux are supported.")]
    UnsupportedPlatform { os: String, arch: String },

    #[error(
        "merobox binary not found at {}. Run `merobox-installer install` to download the binary.",
        .path.display()
    )]
    BinaryNotFound { path: PathBuf },

    #[error("merobox binary found at {} but not working: {reason}", .path.display())]
    BinaryNotWorking { path: PathBuf, reason: String },

    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Too many redirects (limit {limit}) while fetching {url}")]
    TooManyRedirects { url: String, limit: usize },

    #[error("Request to {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("{} did not finish within {after:?}", .path.display())]
    CommandTimeout { path: PathBuf, after: Duration },

    #[error("Checksum mismatch for {asset}. Expected: {expected}, Got: {actual}")]
    ChecksumMismatch {
        asset: String,
        expected: String,
        actual: String,
    },
}

impl InstallerError {
    /// True for an HTTP 404, i.e. the release asset has not been published.
    pub fn is_not_found(&self) -> bool {
        matches!(self, InstallerError::Http { status: 404, .. })
    }

    /// Whether repeating the same request could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            InstallerError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Returns true if anywhere in the chain of `err` there is an HTTP 404.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<InstallerError>()
            .is_some_and(InstallerError::is_not_found)
    })
}
