//! SHA-256 verification against a `.sha256` sidecar file.

use sha2::{Digest, Sha256};

use crate::error::InstallerError;

/// Expected digest read from a checksum sidecar. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumRecord(String);

impl ChecksumRecord {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Parses sidecar text in `sha256sum` format; only the first token is read.
///
/// The token is kept verbatim. An empty sidecar yields an empty record, which
/// matches no digest.
pub fn parse_sidecar(text: &str) -> ChecksumRecord {
    ChecksumRecord(text.split_whitespace().next().unwrap_or_default().to_string())
}

/// Verifies `bytes` against the lowercase hex digest in `sidecar`.
pub fn verify(asset: &str, bytes: &[u8], sidecar: &str) -> Result<(), InstallerError> {
    let expected = parse_sidecar(sidecar);
    let actual = sha256_hex(bytes);
    if actual != expected.as_str() {
        return Err(InstallerError::ChecksumMismatch {
            asset: asset.to_string(),
            expected: expected.0,
            actual,
        });
    }
    Ok(())
}
