pub mod checksum;
pub mod cleanup;
pub mod config;
pub mod download;
pub mod error;
pub mod http;
pub mod install;
pub mod platform;
pub mod runtime;
pub mod wrapper;

pub use config::InstallerConfig;
pub use error::InstallerError;
pub use install::{InstallOutcome, install};
pub use platform::{PlatformInfo, detect_platform, is_platform_supported, make_asset_name};
