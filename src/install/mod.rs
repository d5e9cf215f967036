use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{
    checksum,
    cleanup::{self, CleanupGuard, SharedCleanupContext},
    config::InstallerConfig,
    download::{Downloader, HttpDownloader, ReleaseUrls, fetch_release},
    error::is_not_found,
    http::HttpClient,
    platform::{PlatformInfo, detect_platform, make_asset_name},
    runtime::Runtime,
};

mod placeholder;

pub use placeholder::placeholder_script;

/// rwxr-xr-x
pub const EXECUTABLE_MODE: u32 = 0o755;

/// How an install run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// A working binary was already in place; nothing was downloaded.
    AlreadyInstalled,
    /// A verified binary was written.
    Installed,
    /// The release was not published; an inert placeholder was written.
    Placeholder,
}

/// Installs the configured merobox release for the running host.
///
/// This is the postinstall entry point: it detects the platform, wires up
/// the HTTP downloader and removes partial files on Ctrl-C.
#[tracing::instrument(skip(runtime, config))]
pub async fn install<R: Runtime + 'static>(
    runtime: R,
    config: &InstallerConfig,
) -> Result<InstallOutcome> {
    let platform = detect_platform(&runtime)?;
    let client = HttpClient::new(config.http.clone())?;
    let cleanup_ctx = cleanup::new_shared();
    let installer = Installer::new(runtime, HttpDownloader::new(client), Arc::clone(&cleanup_ctx));

    let ctrl_c_handler = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, cleaning up...");
            cleanup_ctx
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .cleanup();
            std::process::exit(130);
        }
    });

    let result = installer.run(config, &platform).await;
    ctrl_c_handler.abort();
    result
}

pub struct Installer<R: Runtime, D: Downloader> {
    runtime: R,
    downloader: D,
    cleanup_ctx: SharedCleanupContext,
}

impl<R: Runtime, D: Downloader> Installer<R, D> {
    pub fn new(runtime: R, downloader: D, cleanup_ctx: SharedCleanupContext) -> Self {
        Self {
            runtime,
            downloader,
            cleanup_ctx,
        }
    }

    /// Runs one install attempt.
    ///
    /// An existing binary that answers `--version` is kept without touching
    /// the network. A broken one is deleted and reinstalled. A 404 for the
    /// release produces a placeholder instead of an error.
    #[tracing::instrument(skip(self, config))]
    pub async fn run(
        &self,
        config: &InstallerConfig,
        platform: &PlatformInfo,
    ) -> Result<InstallOutcome> {
        let dest = config.binary_path();

        if self.runtime.exists(&dest) {
            if self.is_working(&dest) {
                println!("   merobox already installed: {}", dest.display());
                return Ok(InstallOutcome::AlreadyInstalled);
            }
            println!("   existing binary is corrupted, re-downloading...");
            self.runtime
                .remove_file(&dest)
                .with_context(|| format!("Failed to remove corrupted binary at {:?}", dest))?;
        }

        println!("   installing merobox {} for {}", config.version, platform);

        self.runtime
            .create_dir_all(&config.bin_dir)
            .with_context(|| format!("Failed to create directory {:?}", config.bin_dir))?;

        let asset = make_asset_name(&config.version, platform);
        let urls = ReleaseUrls::new(&config.releases_base_url, &config.version, &asset);

        let payload = match fetch_release(&self.downloader, &urls).await {
            Ok(payload) => payload,
            Err(e) if is_not_found(&e) => {
                warn!("Release {} not found ({:#})", config.version, e);
                println!(
                    "   release {} not found; merobox will work once the release is available.",
                    config.version
                );
                println!(
                    "   for now, install merobox manually and place it in: {}",
                    dest.display()
                );
                let script = placeholder_script(&config.version, &asset, &dest);
                self.write_executable(&dest, script.as_bytes())?;
                return Ok(InstallOutcome::Placeholder);
            }
            Err(e) => return Err(e),
        };

        checksum::verify(&asset, &payload.binary, &payload.sidecar)?;
        debug!("Checksum verified for {}", asset);

        self.write_executable(&dest, &payload.binary)?;
        println!("   installed merobox {} {}", config.version, dest.display());

        Ok(InstallOutcome::Installed)
    }

    fn is_working(&self, path: &Path) -> bool {
        match self.runtime.run_command(path, &["--version".to_string()]) {
            Ok(output) if output.success => {
                debug!("Existing binary reports {}", output.stdout.trim());
                true
            }
            Ok(output) => {
                info!("Existing binary exited with {:?}", output.code);
                false
            }
            Err(e) => {
                info!("Existing binary could not be executed: {:#}", e);
                false
            }
        }
    }

    /// Writes `contents` next to `dest`, marks it executable and renames it
    /// into place, so `dest` is never observed half-written.
    fn write_executable(&self, dest: &Path, contents: &[u8]) -> Result<()> {
        let tmp_path = temp_path_for(dest);
        let guard = CleanupGuard::new(Arc::clone(&self.cleanup_ctx), tmp_path.clone());

        let result = self.write_then_rename(&tmp_path, dest, contents);
        if result.is_err() && self.runtime.exists(&tmp_path) {
            let _ = self.runtime.remove_file(&tmp_path);
        }
        guard.finish();
        result?;

        // The rename keeps the mode, but some filesystems drop it
        if cfg!(unix) {
            self.runtime.set_permissions(dest, EXECUTABLE_MODE)?;
        }
        Ok(())
    }

    fn write_then_rename(&self, tmp_path: &Path, dest: &Path, contents: &[u8]) -> Result<()> {
        self.runtime.write(tmp_path, contents)?;
        self.runtime.set_permissions(tmp_path, EXECUTABLE_MODE)?;
        self.runtime.rename(tmp_path, dest)?;
        Ok(())
    }
}

fn temp_path_for(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    dest.with_file_name(name)
}
