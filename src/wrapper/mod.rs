//! Library surface around the installed merobox binary.
//!
//! These helpers locate the binary, confirm it runs and forward argument
//! vectors to it. They use non-blocking process spawning so they can be
//! called from long-running async programs.

use anyhow::{Context, Result};
use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::binary_path;
use crate::error::InstallerError;

/// Upper bound for the `--version` liveness check.
const LIVENESS_TIMEOUT: Duration = Duration::from_secs(10);

/// How the child's standard streams are wired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StdioMode {
    /// Share the caller's stdin, stdout and stderr.
    #[default]
    Inherit,
    /// Capture stdout and stderr into [`RunOutput`].
    Piped,
    /// Discard all output.
    Ignore,
}

impl StdioMode {
    fn stdin(self) -> Stdio {
        match self {
            StdioMode::Inherit => Stdio::inherit(),
            StdioMode::Piped | StdioMode::Ignore => Stdio::null(),
        }
    }

    fn output(self) -> Stdio {
        match self {
            StdioMode::Inherit => Stdio::inherit(),
            StdioMode::Piped => Stdio::piped(),
            StdioMode::Ignore => Stdio::null(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub cwd: Option<PathBuf>,
    /// Extra variables on top of the inherited environment.
    pub env: HashMap<String, String>,
    pub stdio: StdioMode,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub success: bool,
    pub code: Option<i32>,
    /// Empty unless run with [`StdioMode::Piped`].
    pub stdout: String,
    pub stderr: String,
}

/// Path of the installed binary, failing if nothing is installed there.
pub fn binary_path_checked(bin_dir: &Path) -> Result<PathBuf, InstallerError> {
    let path = binary_path(bin_dir);
    if !path.exists() {
        return Err(InstallerError::BinaryNotFound { path });
    }
    Ok(path)
}

/// Confirms the binary exists and answers `--version`.
#[tracing::instrument]
pub async fn ensure(bin_dir: &Path) -> Result<PathBuf, InstallerError> {
    let path = binary_path_checked(bin_dir)?;
    version_output(&path).await?;
    Ok(path)
}

/// Runs merobox with `args`, inheriting stdio unless told otherwise.
///
/// A non-zero exit is reported through [`RunOutput`], not as an error.
#[tracing::instrument(skip(options))]
pub async fn run(bin_dir: &Path, args: &[String], options: RunOptions) -> Result<RunOutput> {
    let path = ensure(bin_dir).await?;

    let mut command = Command::new(&path);
    command
        .args(args)
        .envs(&options.env)
        .stdin(options.stdio.stdin())
        .stdout(options.stdio.output())
        .stderr(options.stdio.output())
        .kill_on_drop(true);
    if let Some(cwd) = &options.cwd {
        command.current_dir(cwd);
    }

    debug!("Running {:?} {:?}", path, args);
    let child = command.output();
    let output = match options.timeout {
        Some(limit) => timeout(limit, child)
            .await
            .map_err(|_| InstallerError::CommandTimeout {
                path: path.clone(),
                after: limit,
            })?,
        None => child.await,
    }
    .with_context(|| format!("Failed to run {:?}", path))?;

    Ok(RunOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Version string reported by the installed binary.
pub async fn version(bin_dir: &Path) -> Result<String, InstallerError> {
    let path = binary_path_checked(bin_dir)?;
    version_output(&path).await
}

/// Never fails; any problem means "not available".
pub async fn is_available(bin_dir: &Path) -> bool {
    match ensure(bin_dir).await {
        Ok(_) => true,
        Err(e) => {
            debug!("merobox is not available: {}", e);
            false
        }
    }
}

async fn version_output(path: &Path) -> Result<String, InstallerError> {
    let not_working = |reason: String| InstallerError::BinaryNotWorking {
        path: path.to_path_buf(),
        reason,
    };

    let output = timeout(
        LIVENESS_TIMEOUT,
        Command::new(path)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| not_working(format!("--version timed out after {:?}", LIVENESS_TIMEOUT)))?
    .map_err(|e| not_working(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(not_working(format!(
            "--version exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::BINARY_NAME;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::{TempDir, tempdir};

    /// A stand-in merobox: prints its version, echoes args, honours MEROBOX_EXIT.
    const FAKE_MEROBOX: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "merobox 0.1.27"
  exit 0
fi
echo "args: $*"
echo "cwd: $(pwd)"
echo "to stderr" >&2
exit "${MEROBOX_EXIT:-0}"
"#;

    fn install_script(contents: &str) -> TempDir {
        let dir = tempdir().unwrap();
        let path = dir.path().join(BINARY_NAME);
        std::fs::write(&path, contents).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        dir
    }

    fn piped() -> RunOptions {
        RunOptions {
            stdio: StdioMode::Piped,
            ..RunOptions::default()
        }
    }

    #[test]
    fn test_binary_path_checked_missing() {
        let dir = tempdir().unwrap();
        let err = binary_path_checked(dir.path()).unwrap_err();
        assert!(matches!(err, InstallerError::BinaryNotFound { .. }));
        assert!(err.to_string().contains("merobox-installer install"));
    }

    #[tokio::test]
    async fn test_ensure_and_version() {
        let dir = install_script(FAKE_MEROBOX);

        let path = ensure(dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join(BINARY_NAME));
        assert_eq!(version(dir.path()).await.unwrap(), "merobox 0.1.27");
        assert!(is_available(dir.path()).await);
    }

    #[tokio::test]
    async fn test_placeholder_is_not_working() {
        let dir = install_script("#!/bin/sh\necho 'merobox binary not found' >&2\nexit 1\n");

        let err = ensure(dir.path()).await.unwrap_err();
        match &err {
            InstallerError::BinaryNotWorking { reason, .. } => {
                assert!(reason.contains("merobox binary not found"));
            }
            other => panic!("expected BinaryNotWorking, got {other:?}"),
        }
        assert!(!is_available(dir.path()).await);
    }

    #[tokio::test]
    async fn test_non_executable_file_is_not_working() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(BINARY_NAME), FAKE_MEROBOX).unwrap();

        assert!(matches!(
            ensure(dir.path()).await,
            Err(InstallerError::BinaryNotWorking { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_available() {
        let dir = tempdir().unwrap();
        assert!(!is_available(dir.path()).await);
        assert!(matches!(
            version(dir.path()).await,
            Err(InstallerError::BinaryNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_forwards_args_cwd_and_env() {
        let dir = install_script(FAKE_MEROBOX);
        let work = tempdir().unwrap();

        let mut options = piped();
        options.cwd = Some(work.path().to_path_buf());
        options.env.insert("MEROBOX_EXIT".into(), "3".into());

        let output = run(
            dir.path(),
            &["node".to_string(), "list".to_string()],
            options,
        )
        .await
        .unwrap();

        assert!(!output.success);
        assert_eq!(output.code, Some(3));
        assert!(output.stdout.contains("args: node list"));
        let cwd = work.path().canonicalize().unwrap();
        assert!(output.stdout.contains(&format!("cwd: {}", cwd.display())));
        assert_eq!(output.stderr.trim(), "to stderr");
    }

    #[tokio::test]
    async fn test_run_ignore_captures_nothing() {
        let dir = install_script(FAKE_MEROBOX);
        let options = RunOptions {
            stdio: StdioMode::Ignore,
            ..RunOptions::default()
        };

        let output = run(dir.path(), &["--help".to_string()], options)
            .await
            .unwrap();

        assert!(output.success);
        assert!(output.stdout.is_empty());
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let dir = install_script(
            "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then echo v; exit 0; fi\nsleep 5\n",
        );
        let mut options = piped();
        options.timeout = Some(Duration::from_millis(200));

        let err = run(dir.path(), &["up".to_string()], options)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<InstallerError>(),
            Some(InstallerError::CommandTimeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_without_binary_fails_with_not_found() {
        let dir = tempdir().unwrap();
        let err = run(dir.path(), &[], RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallerError>(),
            Some(InstallerError::BinaryNotFound { .. })
        ));
    }
}
