//! Hashing utilities for artifact verification.
//!
//! This module provides:
//! - `ContentHash`: A full 64-character SHA-256 digest of an artifact
//! - `hash_file()`: Streaming file hashing
//! - `hash_bytes()`: Arbitrary byte hashing

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// A full 64-character SHA-256 hash of an artifact's byte stream.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string (64 characters). It serializes
/// as a bare string so the manifest's `sha256` field stays a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl ContentHash {
  /// Whether this is a well-formed lowercase hex SHA-256 digest.
  pub fn is_well_formed(&self) -> bool {
    is_valid_digest(&self.0)
  }
}

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Error while hashing a file.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
  #[error("failed to open {path}: {source}")]
  Open {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to read {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

/// Hash a file's contents.
///
/// Streams the file through SHA-256 and returns the lowercase hex digest.
pub fn hash_file(path: &Path) -> Result<ContentHash, HashError> {
  let mut file = fs::File::open(path).map_err(|e| HashError::Open {
    path: path.display().to_string(),
    source: e,
  })?;

  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(|e| HashError::Read {
      path: path.display().to_string(),
      source: e,
    })?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(hex::encode(hasher.finalize()))
}

/// Check that `s` is exactly 64 lowercase hex characters.
pub fn is_valid_digest(s: &str) -> bool {
  s.len() == DIGEST_HEX_LEN && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
