use crate::error::InstallerError;
use crate::runtime::Runtime;

use super::detection::{Arch, Os, PlatformInfo, detect_platform};

/// Version used by [`expected_asset_name`] when none is given.
pub const DEFAULT_ASSET_VERSION: &str = "v0.1.0";

/// Builds the release asset name, e.g. `merobox-v0.1.27-linux-x64`.
///
/// The libc flavor does not take part in the name.
pub fn make_asset_name(version: &str, platform: &PlatformInfo) -> String {
    format_asset_name(version, platform.os, &platform.arch)
}

/// Same as [`make_asset_name`] for raw OS and architecture names.
pub fn make_asset_name_for(version: &str, os: &str, arch: &str) -> Result<String, InstallerError> {
    let parsed = Os::parse(os).ok_or_else(|| InstallerError::UnsupportedPlatform {
        os: os.to_string(),
        arch: arch.to_string(),
    })?;
    Ok(format_asset_name(version, parsed, &Arch::parse(arch)))
}

fn format_asset_name(version: &str, os: Os, arch: &Arch) -> String {
    format!("merobox-{}-{}-{}", version, os, arch)
}

/// Asset name for the running host.
pub fn expected_asset_name<R: Runtime + ?Sized>(
    runtime: &R,
    version: Option<&str>,
) -> Result<String, InstallerError> {
    let platform = detect_platform(runtime)?;
    Ok(make_asset_name(
        version.unwrap_or(DEFAULT_ASSET_VERSION),
        &platform,
    ))
}
