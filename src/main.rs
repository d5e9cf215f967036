use anyhow::Result;
use clap::Parser;
use log::{debug, warn};
use merobox_installer::{
    InstallerConfig,
    config::release_version,
    platform::{detect_platform, make_asset_name},
    runtime::RealRuntime,
    wrapper::{self, RunOptions},
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// merobox-installer - verified installer for the merobox binary
///
/// Downloads the merobox release built for this platform, checks it against
/// its published SHA-256 sidecar and installs it into the bin directory.
///
/// Examples:
///   merobox-installer install                  # Install the pinned release
///   merobox-installer --version-tag v0.2.0 install
///   merobox-installer run -- --help            # Forward arguments to merobox
#[derive(Parser, Debug)]
#[command(author, version = env!("MEROBOX_INSTALLER_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// merobox release tag to install (also via MEROBOX_VERSION)
    #[arg(
        long = "version-tag",
        env = "MEROBOX_VERSION",
        value_name = "TAG",
        global = true
    )]
    pub version_tag: Option<String>,

    /// Directory holding the merobox binary (also via MEROBOX_BIN_DIR)
    #[arg(
        long = "bin-dir",
        env = "MEROBOX_BIN_DIR",
        value_name = "PATH",
        global = true
    )]
    pub bin_dir: Option<PathBuf>,

    /// Release download prefix (also via MEROBOX_RELEASES_URL)
    #[arg(
        long = "releases-url",
        env = "MEROBOX_RELEASES_URL",
        value_name = "URL",
        global = true
    )]
    pub releases_url: Option<String>,

    /// Per-request network timeout in seconds
    #[arg(long = "timeout", value_name = "SECS", global = true)]
    pub timeout: Option<u64>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Download, verify and install merobox (no-op if already working)
    Install,

    /// Show the detected platform and the matching release asset
    Platform(PlatformArgs),

    /// Print the path of the installed binary
    Path,

    /// Print the version reported by the installed binary
    Version,

    /// Exit 0 if merobox is installed and working, 1 otherwise
    Available,

    /// Run merobox with the given arguments
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
pub struct PlatformArgs {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Arguments passed through to merobox
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

impl Cli {
    /// Resolved on demand so `platform` works without a data directory.
    fn config(&self) -> Result<InstallerConfig> {
        let mut config = InstallerConfig::new(
            &RealRuntime,
            self.version_tag.clone(),
            self.bin_dir.clone(),
            self.releases_url.clone(),
        )?;
        if let Some(secs) = self.timeout {
            config.http.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Install => match merobox_installer::install(RealRuntime, &cli.config()?).await {
            // A missing release leaves a placeholder and still counts as installed
            Ok(outcome) => {
                debug!("Install finished: {:?}", outcome);
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                warn!("Install failed: {:#}", e);
                eprintln!("Falling back - merobox not installed: {:#}", e);
                Ok(ExitCode::FAILURE)
            }
        },
        Commands::Platform(args) => {
            let platform = detect_platform(&RealRuntime)?;
            let asset = make_asset_name(release_version(cli.version_tag.as_deref()), &platform);
            if args.json {
                let report = serde_json::json!({
                    "platform": platform,
                    "asset": asset,
                    "supported": platform.is_supported(),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("platform:  {}", platform);
                println!("asset:     {}", asset);
                println!(
                    "supported: {}",
                    if platform.is_supported() { "yes" } else { "no" }
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Path => {
            let path = wrapper::binary_path_checked(&cli.config()?.bin_dir)?;
            println!("{}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Version => {
            println!("{}", wrapper::version(&cli.config()?.bin_dir).await?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Available => {
            if wrapper::is_available(&cli.config()?.bin_dir).await {
                println!("merobox is available");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("merobox is not available");
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Run(args) => {
            let bin_dir = cli.config()?.bin_dir;
            let output = wrapper::run(&bin_dir, &args.args, RunOptions::default()).await?;
            Ok(ExitCode::from(exit_status_byte(output.code)))
        }
    }
}

/// Exit codes outside 0..=255, or death by signal, map to 1.
fn exit_status_byte(code: Option<i32>) -> u8 {
    code.and_then(|c| u8::try_from(c).ok()).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_install_parsing() {
        let cli = Cli::try_parse_from(["merobox-installer", "install"]).unwrap();
        assert!(matches!(cli.command, Commands::Install));
        assert_eq!(cli.bin_dir, None);
        assert_eq!(cli.timeout, None);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "merobox-installer",
            "install",
            "--version-tag",
            "v0.2.0",
            "--bin-dir",
            "/tmp/bin",
            "--timeout",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.version_tag.as_deref(), Some("v0.2.0"));
        assert_eq!(cli.bin_dir, Some(PathBuf::from("/tmp/bin")));
        assert_eq!(cli.timeout, Some(30));

        let config = cli.config().unwrap();
        assert_eq!(config.version, "v0.2.0");
        assert_eq!(config.http.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_cli_run_passes_hyphenated_args() {
        let cli = Cli::try_parse_from([
            "merobox-installer",
            "run",
            "--",
            "nodes",
            "--count",
            "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => assert_eq!(args.args, vec!["nodes", "--count", "2"]),
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_platform_json_flag() {
        let cli = Cli::try_parse_from(["merobox-installer", "platform", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Platform(PlatformArgs { json: true })));
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["merobox-installer"]).is_err());
    }

    #[test]
    fn test_exit_status_byte() {
        assert_eq!(exit_status_byte(Some(0)), 0);
        assert_eq!(exit_status_byte(Some(3)), 3);
        assert_eq!(exit_status_byte(Some(300)), 1);
        assert_eq!(exit_status_byte(None), 1);
    }
}
