//! Platform detection and asset naming
//!
//! This module detects the host operating system, CPU architecture and (on
//! Linux) C library flavor, and derives the release asset name published for
//! that combination.

mod asset;
mod detection;

pub use asset::{DEFAULT_ASSET_VERSION, expected_asset_name, make_asset_name, make_asset_name_for};
pub use detection::{
    Arch, Libc, Os, PlatformInfo, detect_platform, detect_platform_from, is_platform_supported,
    is_platform_supported_from,
};
