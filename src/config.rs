use anyhow::Result;
use log::debug;
use std::path::{Path, PathBuf};

use crate::http::HttpOptions;
use crate::runtime::Runtime;

/// Release tag installed when no version is configured.
pub const DEFAULT_VERSION: &str = "v0.1.27";

/// Direct-download prefix for merobox release assets.
pub const DEFAULT_RELEASES_URL: &str =
    "https://github.com/calimero-network/merobox/releases/download";

#[cfg(windows)]
pub const BINARY_NAME: &str = "merobox.exe";
#[cfg(not(windows))]
pub const BINARY_NAME: &str = "merobox";

/// Everything the installer needs, resolved once at the process boundary.
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    pub version: String,
    pub releases_base_url: String,
    pub bin_dir: PathBuf,
    pub http: HttpOptions,
}

impl InstallerConfig {
    pub fn new<R: Runtime + ?Sized>(
        runtime: &R,
        version: Option<String>,
        bin_dir: Option<PathBuf>,
        releases_base_url: Option<String>,
    ) -> Result<Self> {
        let bin_dir = match bin_dir {
            // An empty dir would leave a bare `merobox`, which is looked up on PATH
            Some(dir) if dir.as_os_str().is_empty() => {
                anyhow::bail!("The bin directory must not be empty")
            }
            Some(dir) => dir,
            None => default_bin_dir(runtime)?,
        };
        let config = Self {
            version: release_version(version.as_deref()).to_string(),
            releases_base_url: releases_base_url
                .unwrap_or_else(|| DEFAULT_RELEASES_URL.to_string()),
            bin_dir,
            http: HttpOptions::default(),
        };
        debug!("Using configuration: {:?}", config);
        Ok(config)
    }

    pub fn with_http(mut self, http: HttpOptions) -> Self {
        self.http = http;
        self
    }

    pub fn binary_path(&self) -> PathBuf {
        binary_path(&self.bin_dir)
    }
}

/// The requested release tag, or [`DEFAULT_VERSION`].
pub fn release_version(requested: Option<&str>) -> &str {
    requested.unwrap_or(DEFAULT_VERSION)
}

/// `<data_local_dir>/merobox/bin`
pub fn default_bin_dir<R: Runtime + ?Sized>(runtime: &R) -> Result<PathBuf> {
    let data_dir = runtime.data_dir().ok_or_else(|| {
        anyhow::anyhow!("Could not determine a data directory; pass --bin-dir or set MEROBOX_BIN_DIR")
    })?;
    Ok(data_dir.join("merobox").join("bin"))
}

/// Fixed location of the installed binary inside `bin_dir`.
pub fn binary_path(bin_dir: &Path) -> PathBuf {
    bin_dir.join(BINARY_NAME)
}
