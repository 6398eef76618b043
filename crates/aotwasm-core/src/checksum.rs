//! Content checksums.
//!
//! A [`Checksum`] is a 256-bit BLAKE3 digest rendered as 64 lowercase hex
//! characters. It is both the registry's content key and the staleness guard
//! carried by metadata views.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, instrument};

use aotwasm_common::RuntimeError;

/// Length of a checksum in hex characters.
pub const CHECKSUM_HEX_LEN: usize = 64;

/// A validated, lowercase hex-encoded 256-bit digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Checksum(String);

impl Checksum {
    /// Parse a hex digest, normalising it to lowercase.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidChecksum`] unless `value` is exactly
    /// 64 hex characters.
    pub fn from_hex(value: &str) -> Result<Self, RuntimeError> {
        let invalid = || RuntimeError::InvalidChecksum {
            value: value.to_string(),
        };

        if value.len() != CHECKSUM_HEX_LEN {
            return Err(invalid());
        }
        hex::decode(value).map_err(|_| invalid())?;

        Ok(Self(value.to_ascii_lowercase()))
    }

    /// The digest as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Checksum {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl AsRef<str> for Checksum {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<blake3::Hash> for Checksum {
    fn from(hash: blake3::Hash) -> Self {
        Self(hash.to_hex().to_string())
    }
}

/// Compute the checksum of `bytes`.
pub fn compute_checksum(bytes: &[u8]) -> Checksum {
    Checksum::from(blake3::hash(bytes))
}

/// Compute the checksum of a file without reading it into memory at once.
///
/// # Errors
///
/// Returns [`RuntimeError::Io`] if the file cannot be read.
#[instrument(skip(path), fields(path = %path.as_ref().display()))]
pub fn compute_file_checksum(path: impl AsRef<Path>) -> Result<Checksum, RuntimeError> {
    let mut file = File::open(path.as_ref())?;
    let mut hasher = blake3::Hasher::new();
    let bytes = io::copy(&mut file, &mut hasher)?;

    let checksum = Checksum::from(hasher.finalize());
    debug!(bytes, checksum = %checksum, "File checksum computed");

    Ok(checksum)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_checksum_deterministic() {
        let a = compute_checksum(b"hello");
        let b = compute_checksum(b"hello");

        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), CHECKSUM_HEX_LEN);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_checksum_single_bit_sensitive() {
        let original = vec![0u8; 1024];
        let mut flipped = original.clone();
        flipped[512] ^= 0x01;

        assert_ne!(compute_checksum(&original), compute_checksum(&flipped));
    }

    #[test]
    fn test_checksum_of_empty_input() {
        assert_eq!(
            compute_checksum(b"").as_str(),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }

    #[test]
    fn test_from_hex_normalises_case() {
        let upper = "AB".repeat(32);
        let checksum = Checksum::from_hex(&upper).unwrap();
        assert_eq!(checksum.as_str(), "ab".repeat(32));
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(Checksum::from_hex("abc").is_err());
        assert!(Checksum::from_hex(&"zz".repeat(32)).is_err());
        assert!(Checksum::from_hex(&"a".repeat(65)).is_err());
        assert!(matches!(
            "nope".parse::<Checksum>(),
            Err(RuntimeError::InvalidChecksum { .. })
        ));
    }

    #[test]
    fn test_file_checksum_matches_in_memory() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"\0asm\x01\0\0\0").unwrap();

        let from_file = compute_file_checksum(file.path()).unwrap();
        assert_eq!(from_file, compute_checksum(b"\0asm\x01\0\0\0"));
    }

    #[test]
    fn test_file_checksum_missing_file() {
        let result = compute_file_checksum("/definitely/not/here.wasm");
        assert!(matches!(result, Err(RuntimeError::Io(_))));
    }
}
