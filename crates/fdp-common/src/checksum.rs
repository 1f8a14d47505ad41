//! SHA-256 checksums for snapshot provenance
//!
//! Every ingested snapshot is recorded in the checkpoint together with the
//! digest of its compressed bytes, so a re-run can tell whether an already
//! processed table was delivered again with different content.

use crate::error::{FdpError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;
use std::path::Path;

/// A hex-encoded SHA-256 digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    /// Digest everything a reader yields
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// Digest a file on disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = std::fs::File::open(path)?;
        Self::from_reader(&mut file)
    }

    /// Wrap an already-computed hex digest
    pub fn from_hex(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Re-read a file and compare its digest against this one
    pub fn verify_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let actual = Self::from_file(&path)?;
        if actual == *self {
            Ok(())
        } else {
            Err(FdpError::ChecksumMismatch {
                path: path.as_ref().to_path_buf(),
                expected: self.0.clone(),
                actual: actual.0,
            })
        }
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
