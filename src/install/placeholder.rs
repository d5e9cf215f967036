use std::path::Path;

/// Script installed in place of the binary when the release asset does not
/// exist. It only prints a diagnostic to stderr and exits with status 1.
pub fn placeholder_script(version: &str, asset: &str, dest: &Path) -> String {
    let lines = [
        format!(
            "merobox binary not found: release {} has no asset {}.",
            version, asset
        ),
        format!(
            "Please install merobox manually and place it at {}, or re-run `merobox-installer install` once the release is published.",
            dest.display()
        ),
    ];

    let mut script = String::from("#!/bin/sh\n");
    for line in &lines {
        script.push_str("echo ");
        script.push_str(&shell_quote(line));
        script.push_str(" >&2\n");
    }
    script.push_str("exit 1\n");
    script
}

/// Single-quotes `s` for POSIX sh.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_script_shape() {
        let script = placeholder_script(
            "v0.1.27",
            "merobox-v0.1.27-linux-x64",
            Path::new("/opt/bin/merobox"),
        );

        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.ends_with("exit 1\n"));
        assert!(script.contains("merobox-v0.1.27-linux-x64"));
        assert!(script.contains("/opt/bin/merobox"));
    }

    #[test]
    fn test_shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$HOME `x`"), "'$HOME `x`'");
    }

    #[cfg(unix)]
    #[test]
    fn test_placeholder_script_runs_and_fails() {
        let script = placeholder_script("v1", "asset", Path::new("/tmp/it's here/merobox"));

        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(&script)
            .output()
            .unwrap();

        assert_eq!(output.status.code(), Some(1));
        assert!(output.stdout.is_empty());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("merobox binary not found"));
        assert!(stderr.contains("/tmp/it's here/merobox"));
    }
}
