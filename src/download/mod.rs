use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::future::try_join;
use log::info;
#[cfg(test)]
use mockall::automock;

use crate::http::HttpClient;

/// Fetches the body of a URL.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// [`Downloader`] backed by the retrying [`HttpClient`].
pub struct HttpDownloader {
    client: HttpClient,
}

impl HttpDownloader {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.client.get_bytes(url).await
    }
}

/// Direct-download locations of a release asset and its checksum sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseUrls {
    pub binary: String,
    pub checksum: String,
}

impl ReleaseUrls {
    /// `<base>/<version>/<asset>` and the same with `.sha256` appended.
    pub fn new(releases_base: &str, version: &str, asset_name: &str) -> Self {
        let binary = format!(
            "{}/{}/{}",
            releases_base.trim_end_matches('/'),
            version,
            asset_name
        );
        let checksum = format!("{}.sha256", binary);
        Self { binary, checksum }
    }
}

/// Downloaded asset bytes together with the sidecar text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasePayload {
    pub binary: Vec<u8>,
    pub sidecar: String,
}

/// Downloads the binary and its sidecar concurrently.
///
/// Both requests must succeed; the first failure is returned.
#[tracing::instrument(skip(downloader))]
pub async fn fetch_release<D: Downloader + ?Sized>(
    downloader: &D,
    urls: &ReleaseUrls,
) -> Result<ReleasePayload> {
    info!("Downloading from: {}", urls.binary);

    let binary = async {
        downloader
            .fetch(&urls.binary)
            .await
            .with_context(|| format!("Failed to download {}", urls.binary))
    };
    let sidecar = async {
        downloader
            .fetch(&urls.checksum)
            .await
            .with_context(|| format!("Failed to download {}", urls.checksum))
    };

    let (binary, sidecar) = try_join(binary, sidecar).await?;
    let sidecar = String::from_utf8(sidecar).context("Checksum file is not valid UTF-8")?;

    info!("Download complete ({} bytes).", binary.len());
    Ok(ReleasePayload { binary, sidecar })
}
