//! Content integrity validation.

use crate::error::{ErrorKind, Result};
use crate::models::{HashAlgorithm, Integrity};
use sha2::{Digest, Sha256};

/// Hex digest of `data` using `algorithm`.
pub fn digest(algorithm: HashAlgorithm, data: &[u8]) -> String {
    match algorithm {
        HashAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
    }
}

/// Check `data` against the digest recorded in the archive header.
///
/// The comparison is case-insensitive on the recorded hash.
pub fn validate(data: &[u8], integrity: &Integrity) -> Result<()> {
    let actual = digest(integrity.algorithm, data);
    if !actual.eq_ignore_ascii_case(&integrity.hash) {
        tracing::error!(expected = %integrity.hash, actual = %actual, "Integrity check failed for archive entry");
        exn::bail!(ErrorKind::Integrity { expected: integrity.hash.clone(), actual });
    }
    Ok(())
}

impl std::str::FromStr for HashAlgorithm {
    type Err = crate::error::Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "SHA256" => Ok(HashAlgorithm::Sha256),
            _ => exn::bail!(ErrorKind::UnsupportedAlgorithm(s.to_string())),
        }
    }
}
