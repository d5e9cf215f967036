use log::debug;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::Path;

use crate::error::InstallerError;
use crate::runtime::Runtime;

/// Shell snippet whose output names the C library in use.
const LIBC_PROBE: &str = "ldd --version 2>&1 || ldd /bin/sh 2>&1 || true";

/// Operating systems that merobox releases are published for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Darwin,
    Linux,
}

impl Os {
    /// Parses an OS name, accepting both `darwin` and Rust's `macos`.
    pub fn parse(os: &str) -> Option<Self> {
        match os.to_ascii_lowercase().as_str() {
            "darwin" | "macos" => Some(Os::Darwin),
            "linux" => Some(Os::Linux),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Darwin => "darwin",
            Os::Linux => "linux",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CPU architecture. Anything other than x64/arm64 is kept verbatim so the
/// platform can still be reported, but it is never considered supported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Arch {
    X64,
    Arm64,
    Other(String),
}

impl Arch {
    pub fn parse(arch: &str) -> Self {
        match arch.to_ascii_lowercase().as_str() {
            "x64" | "x86_64" | "amd64" => Arch::X64,
            "arm64" | "aarch64" => Arch::Arm64,
            other => Arch::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Arch::X64 => "x64",
            Arch::Arm64 => "arm64",
            Arch::Other(name) => name,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Arch::Other(_))
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Arch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Libc {
    Glibc,
    Musl,
}

impl Libc {
    /// Classifies the output of the libc probe.
    fn from_probe_output(output: &str) -> Self {
        if output.to_ascii_lowercase().contains("musl") {
            Libc::Musl
        } else {
            Libc::Glibc
        }
    }
}

impl fmt::Display for Libc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Libc::Glibc => f.write_str("glibc"),
            Libc::Musl => f.write_str("musl"),
        }
    }
}

/// Host platform as seen by the release matrix.
///
/// `libc` is `Some` exactly when `os` is [`Os::Linux`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformInfo {
    pub os: Os,
    pub arch: Arch,
    pub libc: Option<Libc>,
}

impl PlatformInfo {
    pub fn is_supported(&self) -> bool {
        self.arch.is_supported()
    }
}

impl fmt::Display for PlatformInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)?;
        if let Some(libc) = self.libc {
            write!(f, " ({})", libc)?;
        }
        Ok(())
    }
}

/// Detects the platform of the running host.
#[tracing::instrument(skip(runtime))]
pub fn detect_platform<R: Runtime + ?Sized>(runtime: &R) -> Result<PlatformInfo, InstallerError> {
    detect_platform_from(runtime, std::env::consts::OS, std::env::consts::ARCH)
}

/// Detects the platform given raw OS and architecture names.
///
/// The libc probe only runs for Linux and never fails the detection: if the
/// probe cannot be executed the host is assumed to use glibc.
#[tracing::instrument(skip(runtime))]
pub fn detect_platform_from<R: Runtime + ?Sized>(
    runtime: &R,
    os: &str,
    arch: &str,
) -> Result<PlatformInfo, InstallerError> {
    let parsed_os = Os::parse(os).ok_or_else(|| InstallerError::UnsupportedPlatform {
        os: os.to_string(),
        arch: arch.to_string(),
    })?;

    let libc = match parsed_os {
        Os::Linux => Some(probe_libc(runtime)),
        Os::Darwin => None,
    };

    Ok(PlatformInfo {
        os: parsed_os,
        arch: Arch::parse(arch),
        libc,
    })
}

fn probe_libc<R: Runtime + ?Sized>(runtime: &R) -> Libc {
    let args = ["-c".to_string(), LIBC_PROBE.to_string()];
    match runtime.run_command(Path::new("sh"), &args) {
        Ok(output) => {
            let libc = Libc::from_probe_output(&format!("{}{}", output.stdout, output.stderr));
            debug!("libc probe classified host as {}", libc);
            libc
        }
        Err(e) => {
            debug!("libc probe failed ({}), assuming glibc", e);
            Libc::Glibc
        }
    }
}

/// Returns true if a release is published for the host. Never fails.
pub fn is_platform_supported<R: Runtime + ?Sized>(runtime: &R) -> bool {
    is_platform_supported_from(runtime, std::env::consts::OS, std::env::consts::ARCH)
}

/// False when detection fails or the architecture has no release.
pub fn is_platform_supported_from<R: Runtime + ?Sized>(
    runtime: &R,
    os: &str,
    arch: &str,
) -> bool {
    match detect_platform_from(runtime, os, arch) {
        Ok(platform) => platform.is_supported(),
        Err(e) => {
            debug!("Platform not supported: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{CommandOutput, MockRuntime};

    fn runtime_with_probe(output: anyhow::Result<CommandOutput>) -> MockRuntime {
        let mut runtime = MockRuntime::new();
        let mut output = Some(output);
        runtime
            .expect_run_command()
            .withf(|program, args| program == Path::new("sh") && args.len() == 2)
            .times(1)
            .returning(move |_, _| output.take().unwrap());
        runtime
    }

    #[test]
    fn test_linux_x64_without_musl_is_glibc() {
        let runtime = runtime_with_probe(Ok(CommandOutput::ok(
            "ldd (GNU libc) 2.39\nCopyright (C) 2024 Free Software Foundation, Inc.\n",
        )));

        let platform = detect_platform_from(&runtime, "linux", "x86_64").unwrap();

        assert_eq!(
            platform,
            PlatformInfo {
                os: Os::Linux,
                arch: Arch::X64,
                libc: Some(Libc::Glibc),
            }
        );
    }

    #[test]
    fn test_linux_musl_detected_case_insensitively() {
        let mut output = CommandOutput::failed(1);
        output.stderr = "MUSL libc (x86_64)\nVersion 1.2.4\n".to_string();
        let runtime = runtime_with_probe(Ok(output));

        let platform = detect_platform_from(&runtime, "linux", "aarch64").unwrap();

        assert_eq!(platform.arch, Arch::Arm64);
        assert_eq!(platform.libc, Some(Libc::Musl));
    }

    #[test]
    fn test_probe_failure_defaults_to_glibc() {
        let runtime = runtime_with_probe(Err(anyhow::anyhow!("sh: not found")));

        let platform = detect_platform_from(&runtime, "linux", "x64").unwrap();

        assert_eq!(platform.libc, Some(Libc::Glibc));
    }

    #[test]
    fn test_darwin_has_no_libc_and_skips_probe() {
        // No expectations: any subprocess call panics
        let runtime = MockRuntime::new();

        let platform = detect_platform_from(&runtime, "macos", "aarch64").unwrap();

        assert_eq!(platform.os, Os::Darwin);
        assert_eq!(platform.arch, Arch::Arm64);
        assert_eq!(platform.libc, None);
    }

    #[test]
    fn test_unsupported_os_fails() {
        let runtime = MockRuntime::new();

        for os in ["windows", "win32", "freebsd", ""] {
            let err = detect_platform_from(&runtime, os, "x86_64").unwrap_err();
            assert!(
                matches!(err, InstallerError::UnsupportedPlatform { .. }),
                "{os} should be unsupported"
            );
        }
    }

    #[test]
    fn test_unknown_arch_is_reported_but_unsupported() {
        let runtime = MockRuntime::new();

        let platform = detect_platform_from(&runtime, "darwin", "riscv64").unwrap();

        assert_eq!(platform.arch, Arch::Other("riscv64".into()));
        assert!(!platform.is_supported());
    }

    #[test]
    fn test_is_platform_supported_from() {
        let runtime = MockRuntime::new();
        assert!(!is_platform_supported_from(&runtime, "win32", "x64"));
        assert!(!is_platform_supported_from(&runtime, "darwin", "riscv64"));
        assert!(is_platform_supported_from(&runtime, "darwin", "x64"));

        let linux = runtime_with_probe(Ok(CommandOutput::ok("ldd (GNU libc) 2.39")));
        assert!(is_platform_supported_from(&linux, "linux", "arm64"));
    }

    #[test]
    fn test_is_platform_supported_from_survives_probe_failure() {
        let runtime = runtime_with_probe(Err(anyhow::anyhow!("sh: not found")));
        assert!(is_platform_supported_from(&runtime, "linux", "x86_64"));
    }

    #[test]
    fn test_arch_and_os_parse_both_spellings() {
        assert_eq!(Arch::parse("x64"), Arch::X64);
        assert_eq!(Arch::parse("x86_64"), Arch::X64);
        assert_eq!(Arch::parse("arm64"), Arch::Arm64);
        assert_eq!(Arch::parse("aarch64"), Arch::Arm64);
        assert_eq!(Os::parse("Darwin"), Some(Os::Darwin));
        assert_eq!(Os::parse("macos"), Some(Os::Darwin));
        assert_eq!(Os::parse("linux"), Some(Os::Linux));
    }

    #[test]
    fn test_platform_serializes_with_lowercase_names() {
        let platform = PlatformInfo {
            os: Os::Linux,
            arch: Arch::X64,
            libc: Some(Libc::Musl),
        };
        let json = serde_json::to_value(&platform).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"os": "linux", "arch": "x64", "libc": "musl"})
        );

        let darwin = PlatformInfo {
            os: Os::Darwin,
            arch: Arch::Arm64,
            libc: None,
        };
        assert_eq!(darwin.to_string(), "darwin-arm64");
        assert!(serde_json::to_value(&darwin).unwrap()["libc"].is_null());
    }

    #[test]
    fn test_real_host_detection_does_not_panic() {
        let runtime = crate::runtime::RealRuntime;
        let supported = is_platform_supported(&runtime);

        match detect_platform(&runtime) {
            Ok(platform) => {
                assert_eq!(platform.libc.is_some(), platform.os == Os::Linux);
                assert_eq!(supported, platform.is_supported());
            }
            Err(_) => assert!(!supported),
        }
    }
}
